//! Builder for a single transcoding invocation.
//!
//! An invocation is engine-agnostic data: a label for logs, ordered inputs
//! (each with its own input options), output options, and one output file.
//! The `MediaTool` implementation decides how to turn it into a process.

use std::path::{Path, PathBuf};

use crate::models::TrackKind;

/// One input file plus the options that must precede it.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInput {
    /// Options placed before `-i` (e.g. `-stream_loop -1`).
    pub options: Vec<String>,
    /// Input file.
    pub path: PathBuf,
}

/// A fully described transcoding invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    label: String,
    inputs: Vec<ToolInput>,
    args: Vec<String>,
    output: PathBuf,
    output_kind: TrackKind,
}

impl ToolInvocation {
    /// Start an invocation that writes `output` of the given kind.
    pub fn new(label: impl Into<String>, output: impl Into<PathBuf>, output_kind: TrackKind) -> Self {
        Self {
            label: label.into(),
            inputs: Vec::new(),
            args: Vec::new(),
            output: output.into(),
            output_kind,
        }
    }

    /// Add a plain input.
    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(ToolInput {
            options: Vec::new(),
            path: path.into(),
        });
        self
    }

    /// Add an input preceded by input options.
    pub fn input_with<I, S>(mut self, options: I, path: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(ToolInput {
            options: options.into_iter().map(Into::into).collect(),
            path: path.into(),
        });
        self
    }

    /// Add one output option.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several output options.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Label used in logs and error messages.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn inputs(&self) -> &[ToolInput] {
        &self.inputs
    }

    /// Output options (excluding inputs and the output path).
    pub fn output_args(&self) -> &[String] {
        &self.args
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn output_kind(&self) -> TrackKind {
        self.output_kind
    }

    /// Whether any output option equals `flag`.
    pub fn has_arg(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// Value following the output option `flag`, if present.
    pub fn arg_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Flatten to an argument vector: inputs, output options, output path.
    pub fn to_args(&self) -> Vec<String> {
        let mut out = Vec::new();
        for input in &self.inputs {
            out.extend(input.options.iter().cloned());
            out.push("-i".to_string());
            out.push(input.path.to_string_lossy().to_string());
        }
        out.extend(self.args.iter().cloned());
        out.push(self.output.to_string_lossy().to_string());
        out
    }

    /// Render as a shell-like command line for logging.
    pub fn command_line(&self, program: &str) -> String {
        let mut parts = vec![program.to_string()];
        parts.extend(self.to_args().into_iter().map(|a| quote_for_log(&a)));
        parts.join(" ")
    }
}

fn quote_for_log(arg: &str) -> String {
    if arg.is_empty() || arg.contains(char::is_whitespace) {
        format!("\"{}\"", arg)
    } else {
        arg.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_args_orders_inputs_before_output_options() {
        let inv = ToolInvocation::new("loop_audio", "/w/looped.m4a", TrackKind::Audio)
            .input_with(["-stream_loop", "-1"], "/w/voice.mp3")
            .args(["-t", "10.000", "-c:a", "aac"]);

        assert_eq!(
            inv.to_args(),
            vec![
                "-stream_loop",
                "-1",
                "-i",
                "/w/voice.mp3",
                "-t",
                "10.000",
                "-c:a",
                "aac",
                "/w/looped.m4a"
            ]
        );
    }

    #[test]
    fn arg_value_finds_following_token() {
        let inv = ToolInvocation::new("pad_audio", "o.m4a", TrackKind::Audio)
            .input("a.mp3")
            .args(["-t", "12.5"]);
        assert_eq!(inv.arg_value("-t"), Some("12.5"));
        assert_eq!(inv.arg_value("-shortest"), None);
        assert!(!inv.has_arg("-shortest"));
    }

    #[test]
    fn command_line_quotes_spaces() {
        let inv = ToolInvocation::new("normalize", "out dir/n.mp4", TrackKind::Video).input("in.mp4");
        let line = inv.command_line("ffmpeg");
        assert!(line.starts_with("ffmpeg -i in.mp4"));
        assert!(line.ends_with("\"out dir/n.mp4\""));
    }
}
