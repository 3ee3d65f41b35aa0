//! Purpose: Compile `mapconv` tag strings into structured destination paths.
//! Exports: `parse_tag`, `FieldPath`, `Dest`, `Segment`.
//! Role: Leaf of the engine; every other component consumes the `FieldPath` shape.
//! Invariants: A parsed `FieldPath` always has at least one `Dest`.
//! Invariants: Malformed tags fail with `InvalidTag` before any value is touched.
//! Notes: `default=` swallows the rest of the tag (commas included) and must come last.
use std::fmt;

use crate::core::error::Error;

const SLICE_MARKER: &str = "[]";
const DEFAULT_MODIFIER: &str = "default";
const RECURSIVE_MODIFIER: &str = "recursive";

/// One step of a destination path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Segment {
    name: String,
    slice: bool,
}

impl Segment {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when the segment enters a slice of structs (`[]Name`).
    pub fn is_slice(&self) -> bool {
        self.slice
    }
}

/// A full destination path (`A.[]B.C`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Dest {
    segments: Vec<Segment>,
}

impl Dest {
    fn field(name: &str) -> Self {
        Self {
            segments: vec![Segment {
                name: name.to_string(),
                slice: false,
            }],
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn has_slice(&self) -> bool {
        self.segments.iter().any(Segment::is_slice)
    }

    /// Segment names with slice markers stripped.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.segments.iter().map(Segment::name)
    }

    fn slice_before_end(&self) -> bool {
        let last = self.segments.len().saturating_sub(1);
        self.segments[..last].iter().any(Segment::is_slice)
    }
}

/// Compiled form of one field's tag.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldPath {
    dests: Vec<Dest>,
    default: Option<String>,
    recursive: bool,
}

impl FieldPath {
    /// Path of a field without a tag: its own name, no modifiers.
    pub(crate) fn own_name(name: &str) -> Self {
        Self {
            dests: vec![Dest::field(name)],
            default: None,
            recursive: false,
        }
    }

    pub fn dests(&self) -> &[Dest] {
        &self.dests
    }

    /// The destination used when reading; multi-destination tags read from the first.
    pub fn primary(&self) -> &Dest {
        &self.dests[0]
    }

    pub fn default_literal(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }
}

/// Parses `tag` for the field `fallback`. An absent or empty tag maps the field to
/// its own name.
pub fn parse_tag(tag: Option<&str>, fallback: &str) -> Result<FieldPath, Error> {
    let tag = tag.unwrap_or("");
    let (dests, modifiers) = match tag.split_once(',') {
        Some((dests, modifiers)) => (dests, Some(modifiers)),
        None => (tag, None),
    };

    let mut path = FieldPath {
        dests: parse_dests(dests, fallback).map_err(|err| err.with_path(tag))?,
        default: None,
        recursive: false,
    };
    if let Some(modifiers) = modifiers {
        parse_modifiers(modifiers, &mut path).map_err(|err| err.with_path(tag))?;
    }

    if path.recursive {
        if path.default.is_some() {
            return Err(Error::invalid_tag("`default` cannot be combined with `recursive`")
                .with_path(tag));
        }
        if path.dests.iter().any(Dest::slice_before_end) {
            return Err(Error::invalid_tag(
                "`recursive` only allows a slice marker on the final segment",
            )
            .with_path(tag));
        }
    }
    Ok(path)
}

fn parse_dests(input: &str, fallback: &str) -> Result<Vec<Dest>, Error> {
    if input.is_empty() {
        return Ok(FieldPath::own_name(fallback).dests);
    }
    input.split('/').map(parse_dest).collect()
}

fn parse_dest(input: &str) -> Result<Dest, Error> {
    if input.is_empty() {
        return Err(Error::invalid_tag("empty destination"));
    }
    let segments = input
        .split('.')
        .map(parse_segment)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Dest { segments })
}

fn parse_segment(input: &str) -> Result<Segment, Error> {
    let (slice, name) = match input.strip_prefix(SLICE_MARKER) {
        Some(name) => (true, name),
        None => (false, input),
    };
    if name.is_empty() {
        return Err(Error::invalid_tag("empty path segment"));
    }
    if name.contains(&['[', ']'][..]) || name.contains(char::is_whitespace) {
        return Err(Error::invalid_tag(format!("invalid identifier `{input}`")));
    }
    Ok(Segment {
        name: name.to_string(),
        slice,
    })
}

fn parse_modifiers(input: &str, path: &mut FieldPath) -> Result<(), Error> {
    let mut rest = input;
    loop {
        if let Some(literal) = rest
            .strip_prefix(DEFAULT_MODIFIER)
            .and_then(|tail| tail.strip_prefix('='))
        {
            if literal.is_empty() {
                return Err(Error::invalid_tag("`default=` requires a value"));
            }
            path.default = Some(literal.to_string());
            return Ok(());
        }

        let (modifier, tail) = match rest.split_once(',') {
            Some((modifier, tail)) => (modifier, Some(tail)),
            None => (rest, None),
        };
        match modifier {
            RECURSIVE_MODIFIER => path.recursive = true,
            DEFAULT_MODIFIER => {
                return Err(Error::invalid_tag("`default` requires `=value`"));
            }
            "" => return Err(Error::invalid_tag("empty modifier")),
            other => {
                return Err(Error::invalid_tag(format!("unknown modifier `{other}`"))
                    .with_hint("Supported modifiers: `recursive`, `default=<literal>`."));
            }
        }

        match tail {
            Some(tail) => rest = tail,
            None => return Ok(()),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.slice {
            f.write_str(SLICE_MARKER)?;
        }
        f.write_str(&self.name)
    }
}

impl fmt::Display for Dest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, segment) in self.segments.iter().enumerate() {
            if idx > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, dest) in self.dests.iter().enumerate() {
            if idx > 0 {
                f.write_str("/")?;
            }
            write!(f, "{dest}")?;
        }
        if self.recursive {
            write!(f, ",{RECURSIVE_MODIFIER}")?;
        }
        if let Some(literal) = &self.default {
            write!(f, ",{DEFAULT_MODIFIER}={literal}")?;
        }
        Ok(())
    }
}
