//! Interactive script console
//!
//! Buffers input until it forms a complete statement, evaluates it and keeps
//! a bounded transcript of inputs, results, errors and `log()` output.

use std::collections::VecDeque;

use coco_script::ScriptRuntime;

/// Returns true when `source` has no open brackets, strings, template
/// literals, regular expressions or block comments.
///
/// Unbalanced closing brackets count as complete so the evaluator can
/// report the syntax error.
pub fn is_input_complete(source: &str) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str(char),
        Template,
        Regex { in_class: bool },
    }

    let mut state = State::Code;
    let mut brackets = Vec::new();
    // Tracks whether a `/` in code would start a regex or divide.
    let mut operand_expected = true;
    let mut word = String::new();
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => {
                if c.is_alphanumeric() || c == '_' || c == '$' {
                    word.push(c);
                    continue;
                }
                if !word.is_empty() {
                    operand_expected = is_keyword_before_operand(&word);
                    word.clear();
                }
                match c {
                    '/' if chars.peek() == Some(&'/') => {
                        chars.next();
                        state = State::LineComment;
                    }
                    '/' if chars.peek() == Some(&'*') => {
                        chars.next();
                        state = State::BlockComment;
                    }
                    '/' if operand_expected => state = State::Regex { in_class: false },
                    '\'' | '"' => state = State::Str(c),
                    '`' => state = State::Template,
                    '(' | '[' | '{' => {
                        brackets.push(c);
                        operand_expected = true;
                    }
                    ')' | ']' | '}' => {
                        let open = match c {
                            ')' => '(',
                            ']' => '[',
                            _ => '{',
                        };
                        if brackets.pop() != Some(open) {
                            return true;
                        }
                        operand_expected = c == '}';
                    }
                    c if c.is_whitespace() => {}
                    _ => operand_expected = true,
                }
            }
            State::LineComment => {
                if c == '\n' {
                    state = State::Code;
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                }
            }
            State::Str(quote) => match c {
                '\\' => {
                    chars.next();
                }
                '\n' => return true,
                c if c == quote => {
                    state = State::Code;
                    operand_expected = false;
                }
                _ => {}
            },
            State::Template => match c {
                '\\' => {
                    chars.next();
                }
                '`' => {
                    state = State::Code;
                    operand_expected = false;
                }
                _ => {}
            },
            State::Regex { in_class } => match c {
                '\\' => {
                    chars.next();
                }
                '\n' => return true,
                '[' => state = State::Regex { in_class: true },
                ']' => state = State::Regex { in_class: false },
                '/' if !in_class => {
                    state = State::Code;
                    operand_expected = false;
                }
                _ => {}
            },
        }
    }

    brackets.is_empty() && matches!(state, State::Code | State::LineComment)
}

/// Keywords after which an expression starts, so a `/` opens a regex.
fn is_keyword_before_operand(word: &str) -> bool {
    matches!(
        word,
        "return" | "typeof" | "instanceof" | "in" | "of" | "new" | "delete" | "void" | "throw"
            | "case" | "do" | "else" | "yield" | "await"
    )
}

/// Outcome of feeding one line to the console.
#[derive(Debug, Clone, PartialEq)]
pub enum InputStatus {
    /// More lines are needed before the input can be evaluated.
    Incomplete,
    /// The input was handled; these lines followed the echoed input into the transcript.
    Handled(Vec<String>),
}

pub struct Console {
    pending: String,
    history: VecDeque<String>,
    capacity: usize,
}

impl Console {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: String::new(),
            history: VecDeque::new(),
            capacity,
        }
    }

    /// Whether a multi-line input is being buffered.
    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn handle_input(&mut self, runtime: &ScriptRuntime, line: &str) -> InputStatus {
        if !self.is_pending() {
            if let Some(command) = line.trim().strip_prefix(':') {
                let command = command.trim();
                // Replaying the transcript does not add to it.
                if command == "history" {
                    return InputStatus::Handled(self.history().map(str::to_string).collect());
                }
                let output = self.run_command(runtime, command);
                return InputStatus::Handled(self.append_all(output));
            }
            if line.trim().is_empty() {
                return InputStatus::Handled(Vec::new());
            }
        }

        if !self.pending.is_empty() {
            self.pending.push('\n');
        }
        self.pending.push_str(line);

        if !is_input_complete(&self.pending) {
            return InputStatus::Incomplete;
        }

        let source = std::mem::take(&mut self.pending);
        self.append_message(format!("> {source}"));

        let mut output = Vec::new();
        let result = runtime.evaluate(&source);
        output.extend(runtime.take_messages());
        match result {
            Ok(Some(value)) => output.push(value),
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(error = %e, "console input failed");
                output.push(format!("error: {e}"));
            }
        }

        InputStatus::Handled(self.append_all(output))
    }

    pub fn append_message(&mut self, message: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        while self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(message.into());
    }

    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    fn append_all(&mut self, lines: Vec<String>) -> Vec<String> {
        for line in &lines {
            self.append_message(line.clone());
        }
        lines
    }

    fn run_command(&mut self, runtime: &ScriptRuntime, command: &str) -> Vec<String> {
        match command {
            "reload" => {
                let result = runtime.reload_all();
                let mut output = runtime.take_messages();
                output.push(match result {
                    Ok(count) => format!("reloaded {count} script(s)"),
                    Err(e) => format!("error: {e}"),
                });
                output
            }
            "loaded" => {
                let loaded = runtime.loaded();
                if loaded.is_empty() {
                    vec!["no scripts loaded".to_string()]
                } else {
                    loaded
                }
            }
            "gc" => {
                runtime.gc();
                vec!["garbage collected".to_string()]
            }
            "clear" => {
                self.clear();
                Vec::new()
            }
            other => vec![format!(
                "unknown command ':{other}' (try :reload, :loaded, :gc, :history, :clear)"
            )],
        }
    }
}
