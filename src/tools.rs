//! Local tool invocations derived from parsed directives.
//!
//! [`Invocation`] is a closed union: every tool the model may call is a
//! variant here, dispatched by exhaustive match. Each variant knows how to
//! render a human-readable preview for the confirmation prompt and how to
//! execute itself. Execution is synchronous and runs to completion once
//! confirmed; failures are returned as errors for the orchestrator to feed
//! back to the model.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::{json, Value};

use crate::constants::{BINARY_DETECTION_BYTES, READ_FILE_MAX_SIZE, SEARCH_MAX_MATCHES};
use crate::directive::FunctionCall;

/// Static description of one tool: the contract surfaced to the model.
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Parameter names with their descriptions, in declaration order.
    pub parameters: &'static [(&'static str, &'static str)],
}

impl ToolSpec {
    /// JSON Schema descriptor for this tool.
    pub fn input_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for (name, description) in self.parameters {
            properties.insert(
                (*name).to_string(),
                json!({ "description": description, "type": "string" }),
            );
        }
        let required: Vec<&str> = self.parameters.iter().map(|(name, _)| *name).collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Every tool the model can invoke, in the order they are presented.
pub const TOOL_SPECS: &[ToolSpec] = &[
    ToolSpec {
        name: "write_file",
        description: "Modify the full contents of a file. You MUST provide the full contents of the file!",
        parameters: &[
            ("filename", "The file to write"),
            ("content", "The full new contents of the file"),
        ],
    },
    ToolSpec {
        name: "append_to_file",
        description: "Append content to the end of a file.",
        parameters: &[
            ("filename", "The file to append to"),
            ("content", "The content to append"),
        ],
    },
    ToolSpec {
        name: "replace_string_in_file",
        description: "Partially modify the contents of a file. Replaces the first count non-overlapping instances of original_string with new_string. If original_string is empty, it matches at the beginning of the file and after each character, yielding up to k+1 replacements for a k-character file. If count is negative, there is no limit on the number of replacements. You should prefer this function to write_file whenever you are making partial updates to a file.",
        parameters: &[
            ("filename", "The file to modify"),
            ("original_string", "The exact text to replace"),
            ("new_string", "The replacement text"),
            ("count", "How many occurrences to replace; -1 for all"),
        ],
    },
    ToolSpec {
        name: "list_files",
        description: "List files in the project. The list of files can be filtered by providing a regular expression to this function.",
        parameters: &[("pattern", "Regex pattern to filter file paths")],
    },
    ToolSpec {
        name: "rg",
        description: "Recursively search the project for lines matching a regex pattern. Returns matching lines as path:line:content.",
        parameters: &[
            ("pattern", "The regex pattern to search for"),
            ("directory", "The directory to search in"),
        ],
    },
    ToolSpec {
        name: "cat",
        description: "Read the contents of a file",
        parameters: &[("filename", "The name of the file to read")],
    },
];

/// A locally executable command derived from one parsed directive.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    ListFiles {
        pattern: String,
    },
    Search {
        pattern: String,
        directory: String,
    },
    ReadFile {
        filename: String,
    },
    WriteFile {
        filename: String,
        content: String,
    },
    AppendFile {
        filename: String,
        content: String,
    },
    ReplaceString {
        filename: String,
        original: String,
        replacement: String,
        count: i64,
    },
}

impl Invocation {
    /// Maps a parsed call onto an invocation.
    ///
    /// Missing parameters resolve to empty strings; a malformed count
    /// resolves to 0 (replace nothing). An unknown tool name is an error
    /// the caller treats as fatal.
    pub fn from_call(call: &FunctionCall) -> Result<Self> {
        let arg = |name: &str| call.get(name).unwrap_or_default().to_string();

        match call.name.as_str() {
            "list_files" => Ok(Self::ListFiles {
                pattern: arg("pattern"),
            }),
            "rg" => Ok(Self::Search {
                pattern: arg("pattern"),
                directory: arg("directory"),
            }),
            "cat" => Ok(Self::ReadFile {
                filename: arg("filename"),
            }),
            "write_file" => Ok(Self::WriteFile {
                filename: arg("filename"),
                content: arg("content"),
            }),
            "append_to_file" => Ok(Self::AppendFile {
                filename: arg("filename"),
                content: arg("content"),
            }),
            "replace_string_in_file" => Ok(Self::ReplaceString {
                filename: arg("filename"),
                original: arg("original_string"),
                replacement: arg("new_string"),
                count: call
                    .get("count")
                    .and_then(|c| c.trim().parse().ok())
                    .unwrap_or(0),
            }),
            other => anyhow::bail!("unknown tool {}", other),
        }
    }

    /// Shell-flavored description shown in the confirmation prompt.
    pub fn preview(&self) -> String {
        match self {
            Self::ListFiles { pattern } => format!("rg --files | rg {}", pattern),
            Self::Search { pattern, directory } => format!("rg {} {}", pattern, directory),
            Self::ReadFile { filename } => format!("cat {}", filename),
            Self::WriteFile { filename, content } => {
                format!("cat > {} <<-EOF\n{}\nEOF", filename, content)
            }
            Self::AppendFile { filename, content } => {
                format!("cat >> {} <<-EOF\n{}\nEOF", filename, content)
            }
            Self::ReplaceString {
                filename,
                original,
                replacement,
                count,
            } => format!(
                "# replace string in file {} (count {})\n==== old ====\n{}\n==== new ====\n{}\n====     ====",
                filename, count, original, replacement
            ),
        }
    }

    /// Executes the invocation against the current directory.
    pub fn run(&self) -> Result<String> {
        self.run_in(Path::new("."))
    }

    /// Executes the invocation with paths resolved against `root`.
    pub fn run_in(&self, root: &Path) -> Result<String> {
        match self {
            Self::ListFiles { pattern } => list_files(root, pattern),
            Self::Search { pattern, directory } => search(root, pattern, directory),
            Self::ReadFile { filename } => read_file(&resolve(root, filename)),
            Self::WriteFile { filename, content } => {
                fs::write(resolve(root, filename), content)
                    .with_context(|| format!("write {}", filename))?;
                Ok(format!("File {} has been modified successfully.", filename))
            }
            Self::AppendFile { filename, content } => {
                let mut file = fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(resolve(root, filename))
                    .with_context(|| format!("open {}", filename))?;
                file.write_all(content.as_bytes())?;
                Ok(format!("File {} has been modified successfully.", filename))
            }
            Self::ReplaceString {
                filename,
                original,
                replacement,
                count,
            } => {
                let path = resolve(root, filename);
                let content =
                    fs::read_to_string(&path).with_context(|| format!("read {}", filename))?;
                let (replaced, updated) = replace_count(&content, original, replacement, *count);
                fs::write(&path, updated).with_context(|| format!("write {}", filename))?;
                Ok(format!(
                    "Replaced string in file {} {} times.",
                    filename, replaced
                ))
            }
        }
    }
}

fn resolve(root: &Path, filename: &str) -> PathBuf {
    let path = Path::new(filename);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn read_file(path: &Path) -> Result<String> {
    let metadata = fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    if metadata.len() > READ_FILE_MAX_SIZE {
        anyhow::bail!(
            "file too large: {} bytes (max {})",
            metadata.len(),
            READ_FILE_MAX_SIZE
        );
    }

    let content = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let check_len = content.len().min(BINARY_DETECTION_BYTES);
    if content[..check_len].contains(&0) {
        anyhow::bail!("binary file detected, cannot display its content");
    }

    String::from_utf8(content).map_err(|_| anyhow::anyhow!("file is not valid UTF-8"))
}

fn list_files(root: &Path, pattern: &str) -> Result<String> {
    let regex = Regex::new(pattern).with_context(|| format!("invalid pattern {:?}", pattern))?;

    let mut files = Vec::new();
    walk_files(root, root, &mut files);

    let mut out = String::new();
    for file in files {
        if regex.is_match(&file) {
            out.push_str(&file);
            out.push('\n');
        }
    }
    Ok(out)
}

fn search(root: &Path, pattern: &str, directory: &str) -> Result<String> {
    let regex = Regex::new(pattern).with_context(|| format!("invalid pattern {:?}", pattern))?;
    let search_root = if directory.is_empty() {
        root.to_path_buf()
    } else {
        resolve(root, directory)
    };

    let mut files = Vec::new();
    walk_files(&search_root, &search_root, &mut files);

    let mut matches = Vec::new();
    'files: for file in &files {
        let Ok(content) = fs::read(search_root.join(file)) else {
            continue;
        };
        let check_len = content.len().min(BINARY_DETECTION_BYTES);
        if content[..check_len].contains(&0) {
            continue;
        }
        let Ok(text) = String::from_utf8(content) else {
            continue;
        };

        for (line_number, line) in text.lines().enumerate() {
            if regex.is_match(line) {
                matches.push(format!("{}:{}:{}", file, line_number + 1, line));
                if matches.len() >= SEARCH_MAX_MATCHES {
                    break 'files;
                }
            }
        }
    }

    if matches.is_empty() {
        return Ok("No matches found.".to_string());
    }
    let truncated = if matches.len() >= SEARCH_MAX_MATCHES {
        format!("\n... truncated at {} matches", SEARCH_MAX_MATCHES)
    } else {
        String::new()
    };
    Ok(format!("{}{}", matches.join("\n"), truncated))
}

/// Relative paths of all project files, in walk order. Used for the tools
/// here and for the system prompt's project context.
pub(crate) fn project_files(root: &Path) -> Vec<String> {
    let mut files = Vec::new();
    walk_files(root, root, &mut files);
    files
}

/// Collect relative paths of regular files under `dir`, sorted per directory.
/// Hidden entries and common build/dependency trees are skipped.
fn walk_files(base: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let mut entries: Vec<_> = entries.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') {
            continue;
        }

        if path.is_dir() {
            if name == "target" || name == "node_modules" {
                continue;
            }
            walk_files(base, &path, out);
        } else if path.is_file() {
            let relative = path.strip_prefix(base).unwrap_or(&path);
            out.push(relative.to_string_lossy().into_owned());
        }
    }
}

/// Replaces up to `limit` non-overlapping instances of `old` with `new`,
/// returning how many replacements were made and the result.
///
/// A negative limit means no limit. An empty `old` matches at the beginning
/// of the string and after each character.
pub(crate) fn replace_count(s: &str, old: &str, new: &str, limit: i64) -> (usize, String) {
    if old == new || limit == 0 {
        return (0, s.to_string());
    }

    let available = if old.is_empty() {
        s.chars().count() + 1
    } else {
        s.matches(old).count()
    };
    if available == 0 {
        return (0, s.to_string());
    }

    let n = if limit < 0 || available < limit as usize {
        available
    } else {
        limit as usize
    };

    let mut out = String::with_capacity(s.len() + n * new.len());
    let mut start = 0;
    let mut replaced = 0;
    for i in 0..n {
        let at = if old.is_empty() {
            if i > 0 {
                start + s[start..].chars().next().map_or(0, char::len_utf8)
            } else {
                start
            }
        } else {
            let Some(offset) = s[start..].find(old) else {
                break;
            };
            start + offset
        };
        out.push_str(&s[start..at]);
        out.push_str(new);
        start = at + old.len();
        replaced += 1;
    }
    out.push_str(&s[start..]);

    (replaced, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::{FunctionCall, Parameter};

    fn call(name: &str, params: &[(&str, &str)]) -> FunctionCall {
        FunctionCall {
            name: name.to_string(),
            parameters: params
                .iter()
                .map(|(n, v)| Parameter {
                    name: n.to_string(),
                    value: v.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn maps_calls_onto_invocations() {
        let inv = Invocation::from_call(&call("cat", &[("filename", "foo.txt")])).unwrap();
        assert_eq!(
            inv,
            Invocation::ReadFile {
                filename: "foo.txt".to_string()
            }
        );

        let inv = Invocation::from_call(&call(
            "replace_string_in_file",
            &[
                ("filename", "a.txt"),
                ("original_string", "x"),
                ("new_string", "y"),
                ("count", "-1"),
            ],
        ))
        .unwrap();
        assert_eq!(
            inv,
            Invocation::ReplaceString {
                filename: "a.txt".to_string(),
                original: "x".to_string(),
                replacement: "y".to_string(),
                count: -1,
            }
        );
    }

    #[test]
    fn malformed_count_falls_back_to_zero() {
        let inv = Invocation::from_call(&call(
            "replace_string_in_file",
            &[("filename", "a"), ("original_string", "x"), ("new_string", "y"), ("count", "lots")],
        ))
        .unwrap();
        assert!(matches!(inv, Invocation::ReplaceString { count: 0, .. }));
    }

    #[test]
    fn duplicate_parameters_resolve_to_last_seen() {
        let inv = Invocation::from_call(&call(
            "cat",
            &[("filename", "first.txt"), ("filename", "second.txt")],
        ))
        .unwrap();
        assert_eq!(
            inv,
            Invocation::ReadFile {
                filename: "second.txt".to_string()
            }
        );
    }

    #[test]
    fn unknown_tool_is_an_error() {
        let err = Invocation::from_call(&call("rm_rf", &[])).unwrap_err();
        assert!(err.to_string().contains("unknown tool rm_rf"));
    }

    #[test]
    fn replace_count_matches_the_documented_semantics() {
        assert_eq!(replace_count("aaa", "a", "b", -1), (3, "bbb".to_string()));
        assert_eq!(replace_count("aaa", "a", "b", 1), (1, "baa".to_string()));
        assert_eq!(replace_count("aaa", "a", "b", 0), (0, "aaa".to_string()));
        assert_eq!(replace_count("aaa", "a", "a", -1), (0, "aaa".to_string()));
        assert_eq!(replace_count("aaa", "z", "b", -1), (0, "aaa".to_string()));
        // More requested than present: replace what exists.
        assert_eq!(replace_count("aba", "a", "c", 5), (2, "cbc".to_string()));
    }

    #[test]
    fn replace_count_with_empty_needle_inserts_at_every_boundary() {
        assert_eq!(replace_count("ab", "", "-", -1), (3, "-a-b-".to_string()));
        assert_eq!(replace_count("ab", "", "-", 2), (2, "-a-b".to_string()));
        assert_eq!(replace_count("", "", "-", -1), (1, "-".to_string()));
    }

    #[test]
    fn input_schema_lists_all_parameters_as_required() {
        let spec = TOOL_SPECS
            .iter()
            .find(|s| s.name == "replace_string_in_file")
            .unwrap();
        let schema = spec.input_schema();
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"]["original_string"]["description"].is_string());
        assert_eq!(
            schema["required"],
            serde_json::json!(["filename", "original_string", "new_string", "count"])
        );
    }

    #[test]
    fn list_files_filters_by_regex() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("background.js"), "x").unwrap();
        std::fs::write(dir.path().join("popup.html"), "x").unwrap();
        std::fs::write(dir.path().join("icon.png"), "x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/settings.js"), "x").unwrap();

        let inv = Invocation::ListFiles {
            pattern: r"\.(js|html)$".to_string(),
        };
        let out = inv.run_in(dir.path()).unwrap();
        let mut lines: Vec<&str> = out.lines().collect();
        lines.sort_unstable();
        assert_eq!(lines, vec!["background.js", "popup.html", "sub/settings.js"]);
    }

    #[test]
    fn list_files_rejects_a_bad_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let inv = Invocation::ListFiles {
            pattern: "[invalid".to_string(),
        };
        assert!(inv.run_in(dir.path()).is_err());
    }

    #[test]
    fn search_reports_path_line_and_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lib.rs"), "fn main() {}\nlet x = 1;\n").unwrap();

        let inv = Invocation::Search {
            pattern: "fn main".to_string(),
            directory: String::new(),
        };
        let out = inv.run_in(dir.path()).unwrap();
        assert_eq!(out, "lib.rs:1:fn main() {}");

        let inv = Invocation::Search {
            pattern: "nothing_here".to_string(),
            directory: String::new(),
        };
        assert_eq!(inv.run_in(dir.path()).unwrap(), "No matches found.");
    }

    #[test]
    fn read_write_append_round_trip() {
        let dir = tempfile::tempdir().unwrap();

        let write = Invocation::WriteFile {
            filename: "note.txt".to_string(),
            content: "hello".to_string(),
        };
        let msg = write.run_in(dir.path()).unwrap();
        assert!(msg.contains("note.txt"));

        let append = Invocation::AppendFile {
            filename: "note.txt".to_string(),
            content: " world".to_string(),
        };
        append.run_in(dir.path()).unwrap();

        let read = Invocation::ReadFile {
            filename: "note.txt".to_string(),
        };
        assert_eq!(read.run_in(dir.path()).unwrap(), "hello world");
    }

    #[test]
    fn read_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let inv = Invocation::ReadFile {
            filename: "missing.txt".to_string(),
        };
        assert!(inv.run_in(dir.path()).is_err());
    }

    #[test]
    fn read_binary_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blob.bin"), b"ab\0cd").unwrap();
        let inv = Invocation::ReadFile {
            filename: "blob.bin".to_string(),
        };
        let err = inv.run_in(dir.path()).unwrap_err();
        assert!(err.to_string().contains("binary"));
    }

    #[test]
    fn replace_string_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "aaa").unwrap();

        let inv = Invocation::ReplaceString {
            filename: "a.txt".to_string(),
            original: "a".to_string(),
            replacement: "b".to_string(),
            count: -1,
        };
        let msg = inv.run_in(dir.path()).unwrap();
        assert_eq!(msg, "Replaced string in file a.txt 3 times.");
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "bbb");

        std::fs::write(dir.path().join("a.txt"), "aaa").unwrap();
        let inv = Invocation::ReplaceString {
            filename: "a.txt".to_string(),
            original: "a".to_string(),
            replacement: "b".to_string(),
            count: 1,
        };
        inv.run_in(dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "baa");
    }
}
