//! Glob patterns over `/`-separated store keys

use regex::Regex;

use super::error::{Result, TemplateError};

/// Compile a glob into an anchored regex
///
/// `*` and `?` never cross a `/`; `**` matches any number of directories.
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut expr = String::with_capacity(pattern.len() * 2 + 2);
    expr.push('^');

    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    expr.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    expr.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => expr.push_str("[^/]*"),
            '?' => expr.push_str("[^/]"),
            c => expr.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    expr.push('$');
    Regex::new(&expr).map_err(|e| TemplateError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_star_stays_in_directory() {
        let re = glob_to_regex("Code/*.py").unwrap();
        assert!(re.is_match("Code/Snake.py"));
        assert!(!re.is_match("Code/Save/Snake.py"));
        assert!(!re.is_match("Code/Snake.pyc"));
    }

    #[test]
    fn test_double_star_crosses_directories() {
        let re = glob_to_regex("**/*.py").unwrap();
        assert!(re.is_match("Snake.py"));
        assert!(re.is_match("Snake2/Code/Snake.py"));

        let re = glob_to_regex("Snake/**").unwrap();
        assert!(re.is_match("Snake/Code/Save/Snake.py"));
        assert!(!re.is_match("Snake2/Code/Snake.py"));
    }

    #[test]
    fn test_question_mark_and_literals() {
        let re = glob_to_regex("v?.(txt)").unwrap();
        assert!(re.is_match("v1.(txt)"));
        assert!(!re.is_match("v12.(txt)"));
    }
}
