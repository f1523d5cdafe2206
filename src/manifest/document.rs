//! Partial structural parse of cask and formula files.
//!
//! A [`ManifestDocument`] keeps every line of the file verbatim, line
//! endings included. On top of that it records the fields the pipeline
//! rewrites (`version`, `url`, `sha256`) as byte spans of their quoted
//! values, each tagged with the [`Platform`] it belongs to. Updating the
//! document replaces those spans and nothing else, so hand-written
//! comments, `postflight` blocks and stanza order survive untouched.
//!
//! Platform context comes from the enclosing `on_macos`/`on_linux` and
//! `on_arm`/`on_intel` blocks, from `arm:`/`intel:` keys on a `sha256`
//! statement, or, for a literal URL outside any block, from the vendor
//! platform slug inside the URL itself.
//!
//! Only the manifest body and `on_*` platform blocks hold rewritable
//! fields. Values inside any other block (`livecheck`, `postflight`,
//! `def install`) are passed through untouched, as are heredoc bodies.
//!
//! Parsing is strict about structure: an unmatched `end`, an unclosed
//! block or an unterminated string is a [`TapError::Parse`]. Strings,
//! `/.../` regex literals and heredocs are tracked so their contents never
//! count as code.

use regex::Regex;
use std::fmt;
use std::collections::VecDeque;
use std::ops::Range;
use std::sync::LazyLock;

use super::ManifestKind;
use crate::core::TapError;
use crate::models::{ArtifactSet, BuildDescriptor, Platform};

static VERSION_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*version\s+"([^"]*)""#).expect("version regex is valid"));

static URL_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*url\s+"([^"]*)""#).expect("url regex is valid"));

static SHA256_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*sha256\b").expect("sha256 start regex is valid"));

static SHA256_SINGLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*sha256\s+"([^"]*)""#).expect("sha256 regex is valid"));

static SHA256_KEYED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(arm64_linux|x86_64_linux|arm|intel):\s*"([^"]*)""#)
        .expect("keyed sha256 regex is valid")
});

static PLATFORM_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(on_macos|on_linux|on_arm|on_intel)\s+do\b").expect("platform block regex is valid")
});

static KEYWORD_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(class|module|def|if|unless|case|while|until|begin)\b")
        .expect("keyword block regex is valid")
});

static DO_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bdo\s*(\|[^|]*\|)?$").expect("do block regex is valid"));

static BLOCK_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^end\b").expect("end regex is valid"));

/// Which declaration a [`Field`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Version,
    Url,
    Sha256,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Version => "version",
            Self::Url => "url",
            Self::Sha256 => "sha256",
        })
    }
}

/// A rewritable value inside the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub kind: FieldKind,
    pub platform: Option<Platform>,
    /// URL contains `#{...}` and is derived from `version` by Homebrew.
    pub interpolated: bool,
    line: usize,
    span: Range<usize>,
}

impl Field {
    /// 1-based line number, for messages.
    #[must_use]
    pub const fn line_number(&self) -> usize {
        self.line + 1
    }
}

#[derive(Debug, Clone, Copy)]
enum Block {
    Os {
        macos: bool,
    },
    Arch {
        arm: bool,
    },
    Other,
}

/// Line-preserving view of a cask or formula.
#[derive(Debug, Clone)]
pub struct ManifestDocument {
    kind: ManifestKind,
    lines: Vec<String>,
    fields: Vec<Field>,
}

impl ManifestDocument {
    /// Parse `text` as a manifest of the given kind.
    pub fn parse(kind: ManifestKind, text: &str) -> Result<Self, TapError> {
        let what = || format!("{kind} manifest");
        let lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();
        let mut fields = Vec::new();
        let mut stack: Vec<Block> = Vec::new();
        let mut in_sha256 = false;
        let mut last_url_platform: Option<Platform> = None;
        // Terminators of open heredocs; bodies follow in this order.
        let mut heredocs: VecDeque<String> = VecDeque::new();

        for (idx, line) in lines.iter().enumerate() {
            if let Some(id) = heredocs.front() {
                if line.trim() == id.as_str() {
                    heredocs.pop_front();
                }
                continue;
            }

            let scan = scan_line(line);
            heredocs.extend(scan.heredocs.iter().map(|id| (*id).to_string()));
            if !scan.balanced {
                return Err(TapError::parse(what(), format!("unterminated string on line {}", idx + 1)));
            }
            let code = scan.code.trim();
            if code.is_empty() {
                continue;
            }

            if BLOCK_END.is_match(code) {
                if stack.pop().is_none() {
                    return Err(TapError::parse(what(), format!("unexpected 'end' on line {}", idx + 1)));
                }
                last_url_platform = None;
                in_sha256 = false;
                continue;
            }

            let context = context_platform(&stack, kind.default_macos());
            let rewritable = in_field_scope(&stack);

            if rewritable && (in_sha256 || SHA256_START.is_match(scan.code)) {
                let starts = !in_sha256;
                let mut keyed = false;
                for cap in SHA256_KEYED.captures_iter(scan.code) {
                    keyed = true;
                    let os = innermost_os(&stack).or(kind.default_macos()).unwrap_or(true);
                    let platform = match &cap[1] {
                        "arm64_linux" => Platform::LinuxArm64,
                        "x86_64_linux" => Platform::LinuxX64,
                        key => Platform::from_parts(os, key == "arm"),
                    };
                    fields.push(Field {
                        kind: FieldKind::Sha256,
                        platform: Some(platform),
                        interpolated: false,
                        line: idx,
                        span: cap.get(2).map(|m| m.range()).unwrap_or_default(),
                    });
                }
                if !keyed
                    && starts
                    && let Some(cap) = SHA256_SINGLE.captures(scan.code)
                {
                    fields.push(Field {
                        kind: FieldKind::Sha256,
                        platform: context.or(last_url_platform),
                        interpolated: false,
                        line: idx,
                        span: cap.get(1).map(|m| m.range()).unwrap_or_default(),
                    });
                }
                in_sha256 = code.ends_with(',');
                continue;
            }

            if rewritable && let Some(cap) = VERSION_DECL.captures(scan.code) {
                fields.push(Field {
                    kind: FieldKind::Version,
                    platform: None,
                    interpolated: false,
                    line: idx,
                    span: cap.get(1).map(|m| m.range()).unwrap_or_default(),
                });
            } else if rewritable && let Some(cap) = URL_DECL.captures(scan.code) {
                let value = &cap[1];
                let interpolated = value.contains("#{");
                let platform = if interpolated {
                    None
                } else {
                    context.or_else(|| Platform::detect_in(value))
                };
                last_url_platform = platform;
                fields.push(Field {
                    kind: FieldKind::Url,
                    platform,
                    interpolated,
                    line: idx,
                    span: cap.get(1).map(|m| m.range()).unwrap_or_default(),
                });
            }

            if let Some(block) = opens_block(code) {
                stack.push(block);
                last_url_platform = None;
            }
        }

        if let Some(id) = heredocs.front() {
            return Err(TapError::parse(what(), format!("heredoc {id} is never closed")));
        }

        if !stack.is_empty() {
            return Err(TapError::parse(
                what(),
                format!("{} unclosed block(s) at end of file", stack.len()),
            ));
        }

        Ok(Self {
            kind,
            lines,
            fields,
        })
    }

    #[must_use]
    pub const fn kind(&self) -> ManifestKind {
        self.kind
    }

    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Current text of `field`.
    #[must_use]
    pub fn value(&self, field: &Field) -> &str {
        &self.lines[field.line][field.span.clone()]
    }

    /// Value of the first `version` declaration.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.fields.iter().find(|f| f.kind == FieldKind::Version).map(|f| self.value(f))
    }

    /// First field of `kind` for `platform`.
    #[must_use]
    pub fn find(&self, kind: FieldKind, platform: Platform) -> Option<&Field> {
        self.fields.iter().find(|f| f.kind == kind && f.platform == Some(platform))
    }

    /// Rewrite version, checksums and literal URLs for `descriptor`.
    ///
    /// All requirements are checked before the first substitution, so on
    /// error the document is unchanged.
    pub fn apply(
        &mut self,
        descriptor: &BuildDescriptor,
        artifacts: &ArtifactSet,
    ) -> Result<(), TapError> {
        self.check_rewritable()?;

        let mut replacements: Vec<(usize, Range<usize>, String)> = Vec::new();
        for field in &self.fields {
            let new_value = match (field.kind, field.platform) {
                (FieldKind::Version, _) => descriptor.version().to_string(),
                (FieldKind::Url, Some(p)) if !field.interpolated => artifacts.get(p).url.clone(),
                (FieldKind::Sha256, Some(p)) => artifacts.get(p).sha256.to_string(),
                _ => continue,
            };
            replacements.push((field.line, field.span.clone(), new_value));
        }

        // Right to left so earlier spans on the same line stay valid.
        replacements.sort_by(|a, b| (b.0, b.1.start).cmp(&(a.0, a.1.start)));
        for (line, span, value) in replacements {
            self.lines[line].replace_range(span, &value);
        }

        *self = Self::parse(self.kind, &self.render())?;
        Ok(())
    }

    fn check_rewritable(&self) -> Result<(), TapError> {
        let what = || format!("{} manifest", self.kind);

        if !self.fields.iter().any(|f| f.kind == FieldKind::Version) {
            return Err(TapError::parse(what(), "no version declaration"));
        }

        if let Some(orphan) = self.fields.iter().find(|f| {
            f.platform.is_none() && !f.interpolated && f.kind != FieldKind::Version
        }) {
            return Err(TapError::parse(
                what(),
                format!("cannot determine platform for {} on line {}", orphan.kind, orphan.line_number()),
            ));
        }

        for &(kind, platform) in self.kind.required_fields() {
            if self.find(kind, platform).is_none() {
                return Err(TapError::parse(what(), format!("no {kind} for {platform}")));
            }
        }

        Ok(())
    }

    /// Full text of the document.
    #[must_use]
    pub fn render(&self) -> String {
        self.lines.concat()
    }
}

impl fmt::Display for ManifestDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            f.write_str(line)?;
        }
        Ok(())
    }
}

fn innermost_os(stack: &[Block]) -> Option<bool> {
    stack.iter().rev().find_map(|b| match b {
        Block::Os {
            macos,
        } => Some(*macos),
        _ => None,
    })
}

fn innermost_arch(stack: &[Block]) -> Option<bool> {
    stack.iter().rev().find_map(|b| match b {
        Block::Arch {
            arm,
        } => Some(*arm),
        _ => None,
    })
}

/// Fields count only in the manifest body and inside `on_*` blocks.
fn in_field_scope(stack: &[Block]) -> bool {
    stack.iter().skip(1).all(|b| !matches!(b, Block::Other))
}

fn context_platform(stack: &[Block], default_macos: Option<bool>) -> Option<Platform> {
    let macos = innermost_os(stack).or(default_macos)?;
    let arm = innermost_arch(stack)?;
    Some(Platform::from_parts(macos, arm))
}

fn opens_block(code: &str) -> Option<Block> {
    if let Some(cap) = PLATFORM_BLOCK.captures(code) {
        return Some(match &cap[1] {
            "on_macos" => Block::Os {
                macos: true,
            },
            "on_linux" => Block::Os {
                macos: false,
            },
            "on_arm" => Block::Arch {
                arm: true,
            },
            _ => Block::Arch {
                arm: false,
            },
        });
    }

    (KEYWORD_BLOCK.is_match(code) || DO_BLOCK.is_match(code)).then_some(Block::Other)
}

#[derive(Clone, Copy)]
enum Frame {
    Code {
        braces: u32,
    },
    Double,
    Single,
    Regex {
        class: bool,
    },
}

pub(crate) struct LineScan<'a> {
    /// The line up to (not including) any trailing comment.
    pub code: &'a str,
    /// Every string and regex opened on the line was closed on it.
    pub balanced: bool,
    /// Terminators of heredocs opened on the line, in order.
    pub heredocs: Vec<&'a str>,
}

/// Split a Ruby line into code and comment, tracking string and `/.../`
/// regex nesting (including `#{...}` interpolation) and heredoc openers.
pub(crate) fn scan_line(line: &str) -> LineScan<'_> {
    let bytes = line.as_bytes();
    let mut stack = vec![Frame::Code {
        braces: 0,
    }];
    let mut heredocs = Vec::new();
    let mut prev: Option<u8> = None;
    let mut end = bytes.len();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let top = stack.len() - 1;
        match stack[top] {
            Frame::Code {
                braces,
            } => match c {
                b'#' => {
                    end = i;
                    break;
                }
                b'"' => stack.push(Frame::Double),
                b'\'' => stack.push(Frame::Single),
                b'/' if regex_may_start(prev) => stack.push(Frame::Regex {
                    class: false,
                }),
                b'<' if bytes.get(i + 1) == Some(&b'<') => {
                    if let Some((id, next)) = heredoc_at(line, i + 2) {
                        heredocs.push(id);
                        prev = Some(bytes[next - 1]);
                        i = next;
                        continue;
                    }
                    i += 1;
                }
                b'{' => {
                    stack[top] = Frame::Code {
                        braces: braces + 1,
                    };
                }
                b'}' if braces > 0 => {
                    stack[top] = Frame::Code {
                        braces: braces - 1,
                    };
                }
                b'}' if top > 0 => {
                    stack.pop();
                }
                _ => {}
            },
            Frame::Double => match c {
                b'\\' => i += 1,
                b'"' => {
                    stack.pop();
                }
                b'#' if bytes.get(i + 1) == Some(&b'{') => {
                    stack.push(Frame::Code {
                        braces: 0,
                    });
                    i += 1;
                }
                _ => {}
            },
            Frame::Single => match c {
                b'\\' => i += 1,
                b'\'' => {
                    stack.pop();
                }
                _ => {}
            },
            Frame::Regex {
                class,
            } => match c {
                b'\\' => i += 1,
                b'[' => {
                    stack[top] = Frame::Regex {
                        class: true,
                    };
                }
                b']' if class => {
                    stack[top] = Frame::Regex {
                        class: false,
                    };
                }
                b'/' if !class => {
                    stack.pop();
                }
                b'#' if bytes.get(i + 1) == Some(&b'{') => {
                    stack.push(Frame::Code {
                        braces: 0,
                    });
                    i += 1;
                }
                _ => {}
            },
        }
        if !c.is_ascii_whitespace() {
            prev = Some(c);
        }
        i += 1;
    }

    LineScan {
        code: &line[..end],
        balanced: stack.len() == 1,
        heredocs,
    }
}

/// A `/` after an operator, an opening bracket or nothing starts a regex;
/// after an operand it divides.
fn regex_may_start(prev: Option<u8>) -> bool {
    prev.is_none_or(|b| b"(,=!~|&?:;[{".contains(&b))
}

/// Parse a heredoc opener whose `<<` ends just before `start`.
///
/// Accepts `<<~ID`, `<<-ID`, quoted identifiers, and a bare `<<ID` only
/// when `ID` is uppercase, so `a << b` and `x <<y` are not mistaken for one.
/// Returns the identifier and the index just past the opener.
fn heredoc_at(line: &str, start: usize) -> Option<(&str, usize)> {
    let bytes = line.as_bytes();
    let mut i = start;
    let indented = matches!(bytes.get(i), Some(b'~' | b'-'));
    if indented {
        i += 1;
    }
    let quote = match bytes.get(i) {
        Some(&q @ (b'\'' | b'"')) => {
            i += 1;
            Some(q)
        }
        _ => None,
    };

    let id_start = i;
    while bytes.get(i).is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_') {
        i += 1;
    }
    let id = &line[id_start..i];
    let first = *id.as_bytes().first()?;
    if first.is_ascii_digit() || (!indented && quote.is_none() && !first.is_ascii_uppercase()) {
        return None;
    }

    if let Some(q) = quote {
        if bytes.get(i) != Some(&q) {
            return None;
        }
        i += 1;
    }
    Some((id, i))
}
