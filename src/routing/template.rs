//! URI templates.
//!
//! # Responsibilities
//! - Parse `/users/{username}/files/{rest:all}` into literal and variable segments
//! - Compile a template into an anchored matcher for one matching mode
//! - Expand a template back into a URI from variable values
//!
//! # Design Decisions
//! - Variables are greedy with backtracking (leftmost-first), so a variable
//!   stops at the last position where the following literals still match
//! - Literals are escaped; a template can never inject matching syntax
//! - Variable names must be unique within a template

use std::fmt;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Template parse, compile, or expansion failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("variable '{0}' declared more than once")]
    DuplicateVariable(String),

    #[error("unclosed variable starting at byte {0}")]
    UnclosedVariable(usize),

    #[error("unexpected '{{' inside variable at byte {0}")]
    NestedVariable(usize),

    #[error("unexpected '}}' at byte {0}")]
    UnexpectedClose(usize),

    #[error("variable at byte {0} has no name")]
    EmptyVariableName(usize),

    #[error("unknown variable type '{0}'")]
    UnknownVariableType(String),

    #[error("no value for variable '{0}'")]
    MissingVariable(String),

    #[error("failed to compile template: {0}")]
    Compile(String),
}

/// What a variable is allowed to consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariableKind {
    /// One or more characters other than `/`.
    #[default]
    Segment,
    Digits,
    Alpha,
    /// Alphanumerics plus `-`, `_` and `.`.
    Word,
    /// One or more characters other than `?`, crossing `/`.
    Path,
    /// Everything that is left, delimiters included. May be empty.
    All,
}

impl VariableKind {
    fn pattern(&self) -> &'static str {
        match self {
            VariableKind::Segment => "[^/]+",
            VariableKind::Digits => "[0-9]+",
            VariableKind::Alpha => "[A-Za-z]+",
            VariableKind::Word => r"[A-Za-z0-9_.\-]+",
            VariableKind::Path => "[^?]+",
            VariableKind::All => "(?s:.*)",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VariableKind::Segment => "segment",
            VariableKind::Digits => "digits",
            VariableKind::Alpha => "alpha",
            VariableKind::Word => "word",
            VariableKind::Path => "path",
            VariableKind::All => "all",
        }
    }

    /// True if this kind consumes path delimiters.
    pub fn crosses_segments(&self) -> bool {
        matches!(self, VariableKind::Path | VariableKind::All)
    }
}

impl FromStr for VariableKind {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "segment" => Ok(VariableKind::Segment),
            "digits" => Ok(VariableKind::Digits),
            "alpha" => Ok(VariableKind::Alpha),
            "word" => Ok(VariableKind::Word),
            "path" => Ok(VariableKind::Path),
            "all" => Ok(VariableKind::All),
            other => Err(TemplateError::UnknownVariableType(other.to_string())),
        }
    }
}

/// A named, typed hole in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    name: String,
    kind: VariableKind,
}

impl Variable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Variable(Variable),
}

/// How much of the remaining path a template has to cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingMode {
    /// The template must consume the entire remaining path.
    Equals,
    /// The template must consume a prefix of the remaining path.
    #[default]
    StartsWith,
}

/// Options a template is compiled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    pub mode: MatchingMode,
    pub case_sensitive: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            mode: MatchingMode::StartsWith,
            case_sensitive: true,
        }
    }
}

/// Parsed URI template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pattern: String,
    segments: Vec<Segment>,
    literal_len: usize,
}

impl Template {
    /// Parse a template pattern.
    pub fn parse(pattern: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut names: Vec<String> = Vec::new();
        let mut chars = pattern.char_indices();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' => {
                    let mut body = String::new();
                    let mut closed = false;
                    for (inner_pos, inner) in chars.by_ref() {
                        match inner {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(TemplateError::NestedVariable(inner_pos)),
                            other => body.push(other),
                        }
                    }
                    if !closed {
                        return Err(TemplateError::UnclosedVariable(pos));
                    }

                    let (name, kind) = match body.split_once(':') {
                        Some((name, kind)) => (name.trim(), kind.trim().parse()?),
                        None => (body.trim(), VariableKind::default()),
                    };
                    if name.is_empty() {
                        return Err(TemplateError::EmptyVariableName(pos));
                    }
                    if names.iter().any(|n| n == name) {
                        return Err(TemplateError::DuplicateVariable(name.to_string()));
                    }
                    names.push(name.to_string());

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Variable(Variable {
                        name: name.to_string(),
                        kind,
                    }));
                }
                '}' => return Err(TemplateError::UnexpectedClose(pos)),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        let literal_len = segments
            .iter()
            .map(|s| match s {
                Segment::Literal(l) => l.len(),
                Segment::Variable(_) => 0,
            })
            .sum();

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
            literal_len,
        })
    }

    /// The source pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Variable(v) => Some(v),
            Segment::Literal(_) => None,
        })
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables().map(Variable::name)
    }

    pub fn variable_count(&self) -> usize {
        self.variables().count()
    }

    /// Total bytes of literal text.
    pub fn literal_len(&self) -> usize {
        self.literal_len
    }

    /// Compile into a matcher for the given options.
    pub fn compile(&self, options: MatchOptions) -> Result<CompiledTemplate, TemplateError> {
        let mut source = String::from("^");
        for segment in &self.segments {
            match segment {
                Segment::Literal(l) => source.push_str(&regex::escape(l)),
                Segment::Variable(v) => {
                    source.push('(');
                    source.push_str(v.kind.pattern());
                    source.push(')');
                }
            }
        }
        if options.mode == MatchingMode::Equals {
            source.push_str(r"\z");
        }

        let regex = RegexBuilder::new(&source)
            .case_insensitive(!options.case_sensitive)
            .build()
            .map_err(|e| TemplateError::Compile(e.to_string()))?;

        Ok(CompiledTemplate {
            template: self.clone(),
            options,
            regex,
        })
    }

    /// Substitute variable values into the template.
    pub fn expand<F>(&self, lookup: F) -> Result<String, TemplateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut out = String::with_capacity(self.pattern.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(l) => out.push_str(l),
                Segment::Variable(v) => {
                    let value = lookup(&v.name)
                        .ok_or_else(|| TemplateError::MissingVariable(v.name.clone()))?;
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Template::parse(s)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// A template bound to one matching mode and case policy.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    template: Template,
    options: MatchOptions,
    regex: Regex,
}

/// Result of a successful template match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateMatch {
    /// Bytes of the input consumed by the template.
    pub matched_len: usize,
    /// Variable bindings in template order.
    pub variables: Vec<(String, String)>,
}

impl CompiledTemplate {
    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn options(&self) -> MatchOptions {
        self.options
    }

    /// Match the template against the start of `input`.
    pub fn matches(&self, input: &str) -> Option<TemplateMatch> {
        let captures = self.regex.captures(input)?;
        let matched_len = captures.get(0).map(|m| m.end()).unwrap_or(0);
        let variables = self
            .template
            .variables()
            .zip(captures.iter().skip(1))
            .map(|(var, cap)| {
                let value = cap.map(|m| m.as_str()).unwrap_or_default();
                (var.name.clone(), value.to_string())
            })
            .collect();
        Some(TemplateMatch {
            matched_len,
            variables,
        })
    }
}
