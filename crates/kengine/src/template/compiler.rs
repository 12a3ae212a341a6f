//! Line-oriented statement compiler
//!
//! Turns template lines into chat messages. A line starting with a dot and a
//! keyword is a directive:
//!
//! ```text
//! .system You are a careful engineer.
//! Keep answers short.
//! .user Summarize ${file_name}$
//! .exec
//! ```
//!
//! `.system`, `.user` and `.assistant` open a message (text on the same line
//! becomes its first line), `.exec` sends everything accumulated so far to the
//! model, `.include <name>` is resolved by the template store before
//! compilation, `.#` starts a comment and `..` escapes a literal leading dot.
//! Every other line is appended to the current message.

use kengine_core::{ChatMessage, Role};

use super::error::CompileError;

/// One line of template source with its origin
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLine {
    /// Name of the template the line came from
    pub origin: String,
    /// 1-based line number within `origin`
    pub number: usize,
    pub text: String,
}

impl SourceLine {
    pub fn new(origin: impl Into<String>, number: usize, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            number,
            text: text.into(),
        }
    }
}

/// Split template text into numbered source lines
pub fn source_lines(origin: &str, text: &str) -> Vec<SourceLine> {
    text.lines()
        .enumerate()
        .map(|(i, line)| SourceLine::new(origin, i + 1, line))
        .collect()
}

/// Classification of a single line
#[derive(Debug, Clone, PartialEq)]
pub enum Directive<'a> {
    Open(Role, Option<&'a str>),
    Exec,
    Include(&'a str),
    Comment,
    Text(&'a str),
    Unknown(&'a str),
}

/// Classify a template line
pub fn parse_line(text: &str) -> Directive<'_> {
    if text.starts_with("..") {
        return Directive::Text(&text[1..]);
    }
    if text.starts_with(".#") {
        return Directive::Comment;
    }

    let Some(body) = text.strip_prefix('.') else {
        return Directive::Text(text);
    };
    if !body.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Directive::Text(text);
    }

    let (word, rest) = match body.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (body, ""),
    };
    let inline = if rest.is_empty() { None } else { Some(rest) };

    match word {
        "system" => Directive::Open(Role::System, inline),
        "user" => Directive::Open(Role::User, inline),
        "assistant" => Directive::Open(Role::Assistant, inline),
        "exec" => Directive::Exec,
        "include" => Directive::Include(rest.trim_end()),
        other => Directive::Unknown(other),
    }
}

/// A compiled statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Start a new message, optionally with its first line
    Open { role: Role, inline: Option<String> },
    /// Append a line to the current message
    Text(String),
    /// Send the accumulated conversation to the model
    Exec,
}

/// Output of [`Compiler::execute`]: messages interleaved with exec points
#[derive(Debug, Clone, PartialEq)]
pub enum PromptItem {
    Message(ChatMessage),
    Exec,
}

impl PromptItem {
    pub fn is_exec(&self) -> bool {
        matches!(self, PromptItem::Exec)
    }

    pub fn message(&self) -> Option<&ChatMessage> {
        match self {
            PromptItem::Message(m) => Some(m),
            PromptItem::Exec => None,
        }
    }
}

/// Two-phase compiler: lines to statements, statements to prompt items
pub struct Compiler;

impl Compiler {
    /// Parse source lines into statements
    pub fn compile(lines: &[SourceLine]) -> Result<Vec<Statement>, CompileError> {
        let mut statements = Vec::with_capacity(lines.len());

        for line in lines {
            match parse_line(&line.text) {
                Directive::Open(role, inline) => statements.push(Statement::Open {
                    role,
                    inline: inline.map(str::to_string),
                }),
                Directive::Exec => statements.push(Statement::Exec),
                Directive::Comment => {}
                Directive::Text(text) => statements.push(Statement::Text(text.to_string())),
                Directive::Include(name) if name.is_empty() => {
                    return Err(CompileError::MissingIncludeName {
                        origin: line.origin.clone(),
                        line: line.number,
                    });
                }
                Directive::Include(name) => {
                    return Err(CompileError::UnresolvedInclude {
                        origin: line.origin.clone(),
                        line: line.number,
                        name: name.to_string(),
                    });
                }
                Directive::Unknown(word) => {
                    return Err(CompileError::UnknownDirective {
                        origin: line.origin.clone(),
                        line: line.number,
                        directive: word.to_string(),
                    });
                }
            }
        }

        Ok(statements)
    }

    /// Build the message list
    ///
    /// Text before any role opens a `user` message. Empty messages are
    /// dropped, and an `Exec` is appended when messages follow the last one.
    pub fn execute(statements: Vec<Statement>) -> Vec<PromptItem> {
        let mut builder = MessageBuilder::default();

        for statement in statements {
            match statement {
                Statement::Open { role, inline } => {
                    builder.flush();
                    builder.open(role, inline);
                }
                Statement::Text(text) => builder.push_line(text),
                Statement::Exec => {
                    builder.flush();
                    builder.items.push(PromptItem::Exec);
                    builder.pending = false;
                }
            }
        }

        builder.flush();
        if builder.pending {
            builder.items.push(PromptItem::Exec);
        }
        builder.items
    }

    /// Compile and execute in one go
    pub fn build(lines: &[SourceLine]) -> Result<Vec<PromptItem>, CompileError> {
        Ok(Self::execute(Self::compile(lines)?))
    }
}

#[derive(Default)]
struct MessageBuilder {
    items: Vec<PromptItem>,
    current: Option<(Role, Vec<String>)>,
    /// Messages emitted since the last exec
    pending: bool,
}

impl MessageBuilder {
    fn open(&mut self, role: Role, inline: Option<String>) {
        self.current = Some((role, inline.into_iter().collect()));
    }

    fn push_line(&mut self, text: String) {
        self.current
            .get_or_insert_with(|| (Role::User, Vec::new()))
            .1
            .push(text);
    }

    fn flush(&mut self) {
        let Some((role, lines)) = self.current.take() else {
            return;
        };

        // trailing blank lines only; leading layout is kept
        let Some(end) = lines.iter().rposition(|l| !l.trim().is_empty()) else {
            return;
        };

        let content = lines[..=end].join("\n");
        self.items
            .push(PromptItem::Message(ChatMessage::new(role, content)));
        self.pending = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(text: &str) -> Vec<PromptItem> {
        Compiler::build(&source_lines("test", text)).unwrap()
    }

    fn msg(role: Role, content: &str) -> PromptItem {
        PromptItem::Message(ChatMessage::new(role, content))
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(
            parse_line(".system Be brief"),
            Directive::Open(Role::System, Some("Be brief"))
        );
        assert_eq!(parse_line(".user"), Directive::Open(Role::User, None));
        assert_eq!(parse_line(".exec"), Directive::Exec);
        assert_eq!(parse_line(".include  Prompts/base "), Directive::Include("Prompts/base"));
        assert_eq!(parse_line(".# note"), Directive::Comment);
        assert_eq!(parse_line("..hidden"), Directive::Text(".hidden"));
        assert_eq!(parse_line("...."), Directive::Text("..."));
        assert_eq!(parse_line(".5 percent"), Directive::Text(".5 percent"));
        assert_eq!(parse_line("  .user indented"), Directive::Text("  .user indented"));
        assert_eq!(parse_line(".exce"), Directive::Unknown("exce"));
    }

    #[test]
    fn test_plain_text_is_one_user_message() {
        let items = build("def main():\n    pass\n");
        assert_eq!(
            items,
            vec![msg(Role::User, "def main():\n    pass"), PromptItem::Exec]
        );
    }

    #[test]
    fn test_roles_and_exec_groups() {
        let items = build(
            ".system You write code.\n\
             Only code.\n\
             .user Write snake.\n\
             .exec\n\
             .user Now add tests.\n\
             .exec\n",
        );
        assert_eq!(
            items,
            vec![
                msg(Role::System, "You write code.\nOnly code."),
                msg(Role::User, "Write snake."),
                PromptItem::Exec,
                msg(Role::User, "Now add tests."),
                PromptItem::Exec,
            ]
        );
    }

    #[test]
    fn test_implicit_exec_after_trailing_messages() {
        let items = build(".user one\n.exec\n.user two\n");
        assert_eq!(
            items,
            vec![
                msg(Role::User, "one"),
                PromptItem::Exec,
                msg(Role::User, "two"),
                PromptItem::Exec,
            ]
        );
    }

    #[test]
    fn test_trailing_blanks_trimmed_and_empty_messages_dropped() {
        let items = build(".system\n\n.user\n\nhello\n\nworld\n\n.assistant\n\n");
        assert_eq!(
            items,
            vec![msg(Role::User, "\nhello\n\nworld"), PromptItem::Exec]
        );

        let items = build(".user first\n\n\n.user\n  \n");
        assert_eq!(items, vec![msg(Role::User, "first"), PromptItem::Exec]);
    }

    #[test]
    fn test_comments_and_escapes() {
        let items = build(".# header comment\n.user\n..gitignore entry\n");
        assert_eq!(
            items,
            vec![msg(Role::User, ".gitignore entry"), PromptItem::Exec]
        );
    }

    #[test]
    fn test_empty_template_has_no_items() {
        assert!(build("").is_empty());
        assert!(build(".# only a comment\n").is_empty());
    }

    #[test]
    fn test_unknown_directive_reports_location() {
        let err = Compiler::build(&source_lines("Prompts/x", ".user hi\n.exce\n")).unwrap_err();
        match err {
            CompileError::UnknownDirective {
                origin,
                line,
                directive,
            } => {
                assert_eq!(origin, "Prompts/x");
                assert_eq!(line, 2);
                assert_eq!(directive, "exce");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unresolved_include_is_an_error() {
        let err = Compiler::build(&source_lines("t", ".include other\n")).unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedInclude { .. }));
        let err = Compiler::build(&source_lines("t", ".include\n")).unwrap_err();
        assert!(matches!(err, CompileError::MissingIncludeName { line: 1, .. }));
    }
}
