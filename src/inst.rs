//! Instruction table record representation.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// One row of the instruction table: a single encoding form.
///
/// A record is created by the table parser with only the fields printed in the
/// manual filled in. The corrector may rewrite, drop or synthesize records, and
/// the formatter fills in the derived fields (`go_syntax`, `gnu_syntax`,
/// `action`, `multisize`, `datasize` and most `tags`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Manual page the row was found on. `None` for synthesized records.
    pub page: Option<u32>,
    /// Parse order, used to break ties when sorting.
    pub seq: usize,
    /// Instruction family, taken from the section heading (e.g. `SAL/SAR/SHL/SHR`).
    pub name: String,
    /// Encoding in the manual's shorthand, e.g. `C1 /5 ib`.
    pub opcode: String,
    /// Intel syntax, e.g. `SHR r/m32, imm8`.
    pub syntax: String,
    /// Operand tokens of `syntax`, in order.
    pub args: Vec<String>,
    /// Operand encoding class (`Op/En` column).
    pub op_en: String,
    pub valid32: Validity,
    pub valid64: Validity,
    /// `+`-joined feature flags, an architecture generation, or empty.
    pub cpuid: String,
    pub tags: Tags,
    /// Read/write action per operand, aligned with `args`.
    pub action: Vec<Action>,
    /// Whether sibling encodings differ only in operand size.
    pub multisize: bool,
    /// Operation size in bits, 0 if not size-dependent.
    pub datasize: u32,
    pub gnu_syntax: String,
    pub go_syntax: String,
    pub desc: String,
    /// Compatibility note from the manual's footnotes.
    pub compat: String,
}

impl Instruction {
    /// Creates a record from an opcode and an Intel syntax string.
    ///
    /// Both modes default to valid, all other fields are empty.
    pub fn new(opcode: &str, syntax: &str) -> Self {
        let (_, args) = split_syntax(syntax);
        Instruction {
            page: None,
            seq: 0,
            name: String::new(),
            opcode: opcode.to_string(),
            syntax: syntax.to_string(),
            args,
            op_en: String::new(),
            valid32: Validity::Valid,
            valid64: Validity::Valid,
            cpuid: String::new(),
            tags: Tags::new(),
            action: Vec::new(),
            multisize: false,
            datasize: 0,
            gnu_syntax: String::new(),
            go_syntax: String::new(),
            desc: String::new(),
            compat: String::new(),
        }
    }

    /// Returns the mnemonic part of the syntax (including any prefix words).
    pub fn mnemonic(&self) -> &str {
        mnemonic_of(&self.syntax)
    }

    /// Replaces the syntax and recomputes `args` from it.
    pub fn set_syntax(&mut self, syntax: String) {
        self.args = split_syntax(&syntax).1;
        self.syntax = syntax;
    }

    /// Whether this record is redundant and must not be emitted.
    pub fn is_pseudo(&self) -> bool {
        self.tags.contains("pseudo") || self.tags.contains("pseudo64")
    }

    /// Whether the opcode uses a REX prefix. The manual writes it either
    /// first (`REX.W + 8B /r`) or after a mandatory prefix (`F3 REX.W 0F B8 /r`).
    pub fn has_rex(&self) -> bool {
        self.opcode.split_whitespace().any(|part| part.starts_with("REX"))
    }

    /// Returns the opcode split into its whitespace-separated parts.
    pub fn opcode_parts(&self) -> Vec<&str> {
        self.opcode.split_whitespace().collect()
    }
}

/// Words that can precede the actual mnemonic in the manual's syntax column.
const PREFIX_WORDS: &[&str] = &["LOCK", "REP", "REPE", "REPZ", "REPNE", "REPNZ"];

fn mnemonic_end(syntax: &str) -> usize {
    let mut end = 0;
    for word in syntax.split(' ') {
        if word.is_empty() {
            end += 1;
            continue;
        }
        end += word.len();
        if !PREFIX_WORDS.contains(&word) {
            return end;
        }
        end += 1;
    }
    syntax.len()
}

fn mnemonic_of(syntax: &str) -> &str {
    syntax[..mnemonic_end(syntax).min(syntax.len())].trim()
}

/// Splits an Intel syntax string into mnemonic and operand tokens.
///
/// Prefix words like `REP` stay part of the mnemonic.
pub fn split_syntax(syntax: &str) -> (String, Vec<String>) {
    let syntax = syntax.trim();
    let end = mnemonic_end(syntax).min(syntax.len());
    let mnemonic = syntax[..end].trim().to_string();
    let rest = syntax[end..].trim();
    let args = if rest.is_empty() {
        Vec::new()
    } else {
        rest.split(',').map(|arg| arg.trim().to_string()).collect()
    };
    (mnemonic, args)
}

/// Validity of an encoding form in a processor mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Validity {
    /// `V` - supported.
    Valid,
    /// `I` - invalid, raises `#UD`.
    Invalid,
    /// `N.E.` - not encodable; the bytes mean something else in this mode.
    NotEncodable,
    /// `N.P.` - not applicable (the prefix has no effect).
    NotApplicable,
    /// `N.S.` - not supported; assemblers should not emit it.
    NotSupported,
    /// `N.I.` - not implemented.
    NotImplemented,
}

impl Validity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Validity::Valid => "V",
            Validity::Invalid => "I",
            Validity::NotEncodable => "N.E.",
            Validity::NotApplicable => "N.P.",
            Validity::NotSupported => "N.S.",
            Validity::NotImplemented => "N.I.",
        }
    }
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Validity {
    type Err = String;

    /// Parses the manual's spellings (`Valid`, `V`, `NE`, `N. E.`, ...).
    fn from_str(s: &str) -> Result<Self, String> {
        let norm: String = s.chars()
            .filter(|c| !c.is_whitespace() && *c != '.' && *c != '*')
            .collect::<String>()
            .to_ascii_uppercase();
        Ok(match &*norm {
            "V" | "VALID" => Validity::Valid,
            "I" | "INVALID" => Validity::Invalid,
            "NE" => Validity::NotEncodable,
            "NP" => Validity::NotApplicable,
            "NS" => Validity::NotSupported,
            "NI" => Validity::NotImplemented,
            _ => return Err(format!("invalid validity code '{}'", s)),
        })
    }
}

/// How an instruction accesses one of its operands.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Write,
    ReadWrite,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "r",
            Action::Write => "w",
            Action::ReadWrite => "rw",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of hint tags attached to a record.
///
/// Tags are kept sorted, so the joined form is independent of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Tags(BTreeSet<String>);

impl Tags {
    pub fn new() -> Self {
        Tags(BTreeSet::new())
    }

    pub fn insert(&mut self, tag: &str) {
        self.0.insert(tag.to_string());
    }

    pub fn remove(&mut self, tag: &str) {
        self.0.remove(tag);
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.as_str())
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, tag) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_str(",")?;
            }
            f.write_str(tag)?;
        }
        Ok(())
    }
}
