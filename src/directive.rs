//! Embedded directive parsing.
//!
//! The model embeds tool invocations in ordinary text using a line-oriented
//! grammar: each directive line starts with a fixed prefix token followed by
//! comma-separated fields, and parameter bodies are raw literal lines between
//! an opening `parameter` directive and its `end_parameter`. The grammar is
//! deliberately primitive — single-line headers, verbatim multi-line bodies —
//! so a model streaming imperfect tokens cannot corrupt it the way it can
//! corrupt nested markup.
//!
//! ```text
//! <prefix>,function,write_file
//! <prefix>,parameter,filename
//! example.txt
//! <prefix>,end_parameter
//! <prefix>,end_function
//! <prefix>,invoke
//! ```

use thiserror::Error;

/// Returns the default directive prefix.
///
/// Computed by reversal so the live token never appears verbatim in the
/// source, the binary's string table, or any prompt at rest — the model
/// cannot have memorized it and must copy it from the system prompt.
pub fn default_prefix() -> String {
    "function_call#".chars().rev().collect()
}

/// A structured tool invocation extracted from one text block.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub parameters: Vec<Parameter>,
}

/// One named parameter, in the order it was declared. Duplicates are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

impl FunctionCall {
    /// Last-seen value for a parameter name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .rev()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    /// The text ended before a complete directive was found. Callers treat
    /// this as "no directive present", not as a failure.
    #[error("end of input while scanning for a directive")]
    EndOfInput,
    /// A prefix line that does not split into enough comma fields.
    #[error("invalid directive line: {0}")]
    BadDirective(String),
    /// A well-formed directive line carrying the wrong keyword for where it
    /// appeared.
    #[error("expected {expected}, got: {got}")]
    UnexpectedKeyword { expected: &'static str, got: String },
    /// Free text between directives inside an open function call.
    #[error("unexpected text within command: {0}")]
    TextWithinCommand(String),
}

impl ParseError {
    /// Whether this is the benign "no directive here" condition.
    pub fn is_end_of_input(&self) -> bool {
        matches!(self, ParseError::EndOfInput)
    }
}

/// Parser for the directive grammar, bound to one prefix token.
pub struct Parser {
    prefix: String,
}

impl Parser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The line that triggers execution; used as the request stop sequence
    /// so generation halts right after a complete call.
    pub fn invoke_marker(&self) -> String {
        format!("{},invoke", self.prefix)
    }

    fn end_marker(&self) -> String {
        format!("{},end_function", self.prefix)
    }

    /// Parses the complete text of one finalized content block.
    ///
    /// Returns the call and the free text that preceded it. Re-parsing that
    /// leading text never rediscovers the same call. [`ParseError::EndOfInput`]
    /// means no complete directive exists in this text; every other error is
    /// a syntax error in a directive the model started.
    pub fn parse(&self, text: &str) -> Result<(FunctionCall, String), ParseError> {
        if !text.contains(&self.end_marker()) {
            return Err(ParseError::EndOfInput);
        }

        let mut cursor = Cursor {
            lines: text.lines(),
            prefix: &self.prefix,
        };

        let (leading, name) = cursor.consume_function_open()?;
        let parameters = cursor.consume_parameters()?;

        Ok((FunctionCall { name, parameters }, leading))
    }

    /// The assistant text to store in history for a block that carried a
    /// call: everything through `end_function`, with the `invoke` line
    /// restored (the stop sequence removed it from the stream).
    pub fn canonical_text(&self, text: &str) -> String {
        let end = self.end_marker();
        match text.find(&end) {
            Some(at) => format!("{}\n{}\n", &text[..at + end.len()], self.invoke_marker()),
            None => text.to_string(),
        }
    }
}

/// Forward-only scan over the block's lines.
struct Cursor<'a> {
    lines: std::str::Lines<'a>,
    prefix: &'a str,
}

impl<'a> Cursor<'a> {
    /// Consume lines until one starts with the prefix. Returns the free text
    /// passed over and the directive's comma-split fields.
    fn consume_until_prefix(&mut self) -> Result<(String, Vec<&'a str>), ParseError> {
        let mut before: Vec<&str> = Vec::new();
        for line in self.lines.by_ref() {
            if !line.starts_with(self.prefix) {
                before.push(line);
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() < 2 {
                return Err(ParseError::BadDirective(line.to_string()));
            }
            return Ok((before.join("\n"), fields));
        }
        Err(ParseError::EndOfInput)
    }

    /// Consume the function-opening directive, tolerating free text before it.
    fn consume_function_open(&mut self) -> Result<(String, String), ParseError> {
        let (leading, fields) = self.consume_until_prefix()?;

        let keyword = fields[1].trim();
        if keyword != "function" {
            return Err(ParseError::UnexpectedKeyword {
                expected: "function",
                got: keyword.to_string(),
            });
        }
        if fields.len() != 3 {
            return Err(ParseError::BadDirective(fields.join(",")));
        }

        Ok((leading, fields[2].trim().to_string()))
    }

    /// Consume `parameter`/`end_parameter` pairs until `end_function`.
    fn consume_parameters(&mut self) -> Result<Vec<Parameter>, ParseError> {
        let mut parameters = Vec::new();
        loop {
            let (stray, fields) = self.consume_until_prefix()?;
            if !stray.is_empty() {
                return Err(ParseError::TextWithinCommand(stray));
            }

            match fields[1] {
                "parameter" => {
                    if fields.len() != 3 {
                        return Err(ParseError::BadDirective(fields.join(",")));
                    }
                    let name = fields[2].to_string();

                    // The body is everything up to the closing directive,
                    // verbatim, including blank lines.
                    let (value, closer) = self.consume_until_prefix()?;
                    if closer[1] != "end_parameter" {
                        return Err(ParseError::UnexpectedKeyword {
                            expected: "end_parameter",
                            got: closer.join(","),
                        });
                    }

                    parameters.push(Parameter { name, value });
                }
                "end_function" => return Ok(parameters),
                other => {
                    return Err(ParseError::UnexpectedKeyword {
                        expected: "parameter or end_function",
                        got: other.to_string(),
                    })
                }
            }
        }
    }
}
