use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StreamMode {
    Lines,
    Tokens,
    RawLines,
}

/// Options fixed for the lifetime of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamOptions {
    pub extra_chars_allowed: bool,
    pub ignore_blank_lines: bool,
    pub ignore_trailing_blank_lines: bool,
    pub require_trailing_terminator: bool,
    pub line_include_terminators: bool,
    pub line_ignore_trailing_spaces: bool,
    pub token_skip_spaces: bool,
    pub token_skip_terminators: bool,
    pub terminator_skip_spaces: bool,
    pub validate_on_parse: bool,
}

impl StreamMode {
    pub fn options(self) -> StreamOptions {
        use StreamMode::*;
        let lenient = matches!(self, Lines | Tokens);
        StreamOptions {
            extra_chars_allowed: false,
            ignore_blank_lines: self == Tokens,
            ignore_trailing_blank_lines: lenient,
            require_trailing_terminator: false,
            line_include_terminators: self == RawLines,
            line_ignore_trailing_spaces: lenient,
            token_skip_spaces: lenient,
            token_skip_terminators: self == Tokens,
            terminator_skip_spaces: lenient,
            validate_on_parse: true,
        }
    }
}

impl Default for StreamOptions {
    fn default() -> Self {
        StreamMode::Tokens.options()
    }
}

impl From<StreamMode> for StreamOptions {
    fn from(mode: StreamMode) -> Self {
        mode.options()
    }
}

macro_rules! setters {
    ($($name:ident),* $(,)?) => {
        impl StreamOptions {
            $(
                pub fn $name(mut self, value: bool) -> Self {
                    self.$name = value;
                    self
                }
            )*
        }

        /// Explicit values that take precedence over a mode's defaults.
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(deny_unknown_fields)]
        pub struct OptionOverrides {
            $(
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $name: Option<bool>,
            )*
        }

        impl OptionOverrides {
            pub fn apply(&self, mut base: StreamOptions) -> StreamOptions {
                $(
                    if let Some(v) = self.$name {
                        base.$name = v;
                    }
                )*
                base
            }
        }
    };
}

setters!(
    extra_chars_allowed,
    ignore_blank_lines,
    ignore_trailing_blank_lines,
    require_trailing_terminator,
    line_include_terminators,
    line_ignore_trailing_spaces,
    token_skip_spaces,
    token_skip_terminators,
    terminator_skip_spaces,
    validate_on_parse,
);
