use std::{
    ffi::OsStr,
    fmt,
    ops::Deref,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// A glob matched against file names, read from configuration as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GlobPattern(glob::Pattern);

impl GlobPattern {
    pub fn parse(pattern: &str) -> Result<Self, glob::PatternError> {
        glob::Pattern::new(pattern).map(Self)
    }
}

impl Deref for GlobPattern {
    type Target = glob::Pattern;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<String> for GlobPattern {
    type Error = glob::PatternError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<GlobPattern> for String {
    fn from(p: GlobPattern) -> Self {
        p.0.as_str().to_owned()
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// One case on disk: an input file and, optionally, judge data next to it
/// sharing the stem (`01.in` with `01.ans`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsTestcase {
    name: String,
    input: PathBuf,
    judge: Option<PathBuf>,
}

impl FsTestcase {
    pub fn new(name: impl Into<String>, input: impl Into<PathBuf>, judge: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
            judge,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_path(&self) -> &Path {
        &self.input
    }

    pub fn judge_path(&self) -> Option<&Path> {
        self.judge.as_deref()
    }

    /// Files in `dir` whose names match `include` (`*.in` when `None`),
    /// sorted by name.
    pub fn enumerate(
        dir: impl AsRef<Path>,
        include: Option<&GlobPattern>,
        judge_extension: &str,
    ) -> fsutil::Result<Vec<Self>> {
        let mut res = Vec::new();
        for entry in fsutil::read_dir(&dir)?.filter_map(Result::ok) {
            let Ok(ft) = entry.file_type() else {
                continue;
            };
            if ft.is_dir() {
                continue;
            }
            let path = entry.path();
            let Some(filename) = path.file_name().and_then(OsStr::to_str) else {
                continue;
            };
            let included = match include {
                Some(pattern) => pattern.matches(filename),
                None => path.extension() == Some(OsStr::new("in")),
            };
            if !included {
                continue;
            }
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| filename.to_owned());
            let judge = path.with_extension(judge_extension);
            let judge = (judge != path && judge.is_file()).then_some(judge);
            res.push(Self::new(name, path, judge));
        }
        res.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(res)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn glob_pattern_from_config_string() {
        let pat: GlobPattern = serde_json::from_str(r#""*.in""#).unwrap();
        assert!(pat.matches("01.in"));
        assert!(!pat.matches("01.ans"));
        assert_eq!(serde_json::to_string(&pat).unwrap(), r#""*.in""#);
        assert!(serde_json::from_str::<GlobPattern>(r#""[a""#).is_err());
    }

    #[test]
    fn enumerate_pairs_inputs_with_judge_data() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["02.in", "02.ans", "01.in", "01.ans", "03.in", "notes.txt"] {
            fsutil::write(dir.path().join(f), "").unwrap();
        }
        fsutil::mkdir_all(dir.path().join("sub.in")).unwrap();

        let cases = FsTestcase::enumerate(dir.path(), None, "ans").unwrap();
        let names: Vec<_> = cases.iter().map(|t| t.name()).collect();
        assert_eq!(names, ["01", "02", "03"]);
        assert_eq!(cases[0].judge_path(), Some(dir.path().join("01.ans").as_path()));
        assert_eq!(cases[2].judge_path(), None);
        assert_eq!(cases[1].input_path(), dir.path().join("02.in"));

        let include = GlobPattern::parse("0[12].*").unwrap();
        let cases = FsTestcase::enumerate(dir.path(), Some(&include), "ans").unwrap();
        let names: Vec<_> = cases.iter().map(|t| t.input_path().to_owned()).collect();
        assert_eq!(
            names,
            ["01.ans", "01.in", "02.ans", "02.in"].map(|f| dir.path().join(f))
        );
    }
}
