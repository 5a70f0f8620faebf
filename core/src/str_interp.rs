//! `#{name}` placeholders in command templates. `##` stands for a literal `#`.

use std::{borrow::Borrow, collections::HashMap, hash::Hash};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum InterpError {
    #[error("Undefined variable '#{{{name}}}' in {template:?}")]
    UndefinedVar { name: String, template: String },

    #[error("Unclosed '#{{' in {template:?}")]
    UnclosedBrace { template: String },
}

pub fn interp<K, V>(template: &str, vars: &HashMap<K, V>) -> Result<String, InterpError>
where
    K: Borrow<str> + Hash + Eq,
    V: AsRef<str>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(at) = rest.find('#') {
        out.push_str(&rest[..at]);
        let after = &rest[at + 1..];
        if let Some(tail) = after.strip_prefix('#') {
            out.push('#');
            rest = tail;
        } else if let Some(body) = after.strip_prefix('{') {
            let Some(end) = body.find('}') else {
                return Err(InterpError::UnclosedBrace {
                    template: template.to_owned(),
                });
            };
            let name = &body[..end];
            let Some(value) = vars.get(name) else {
                return Err(InterpError::UndefinedVar {
                    name: name.to_owned(),
                    template: template.to_owned(),
                });
            };
            out.push_str(value.as_ref());
            rest = &body[end + 1..];
        } else {
            out.push('#');
            rest = after;
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Interpolates every element of an argv template.
pub fn interp_args<K, V>(templates: &[String], vars: &HashMap<K, V>) -> Result<Vec<String>, InterpError>
where
    K: Borrow<str> + Hash + Eq,
    V: AsRef<str>,
{
    templates.iter().map(|t| interp(t, vars)).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use maplit::hashmap;

    #[test]
    fn interp_ok() {
        let vars = hashmap! {
            "inputFile" => "/tmp/01.in",
            "fileStem" => "main",
        };
        assert_eq!(interp("plain", &vars).unwrap(), "plain");
        assert_eq!(interp("#{inputFile}", &vars).unwrap(), "/tmp/01.in");
        assert_eq!(interp("./#{fileStem}.out", &vars).unwrap(), "./main.out");
        assert_eq!(interp("#{fileStem}#{fileStem}", &vars).unwrap(), "mainmain");
        assert_eq!(interp("{fileStem}", &vars).unwrap(), "{fileStem}");
        assert_eq!(interp("# {x}", &vars).unwrap(), "# {x}");
        assert_eq!(interp("##{fileStem}", &vars).unwrap(), "#{fileStem}");
        assert_eq!(interp("#", &vars).unwrap(), "#");
        assert_eq!(interp("##", &vars).unwrap(), "#");
        assert_eq!(interp("###", &vars).unwrap(), "##");
    }

    #[test]
    fn interp_ng() {
        let vars = hashmap! { "a" => "1" };
        assert_eq!(
            interp("#{a} #{b}", &vars).unwrap_err(),
            InterpError::UndefinedVar {
                name: "b".to_owned(),
                template: "#{a} #{b}".to_owned()
            }
        );
        assert!(matches!(
            interp("#{a", &vars),
            Err(InterpError::UnclosedBrace { .. })
        ));
    }

    #[test]
    fn interp_args_ok() {
        let vars = hashmap! { "filePath".to_owned() => "sol.py".to_owned() };
        let argv = ["python3".to_owned(), "#{filePath}".to_owned()];
        assert_eq!(interp_args(&argv, &vars).unwrap(), ["python3", "sol.py"]);
    }
}
