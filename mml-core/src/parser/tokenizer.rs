use crate::parser::comments::FILLER;
use crate::parser::error::MmlError;
use crate::types::pitch::NoteLetter;
use std::fmt;

/// Symbols that start a note-producing clause
pub const NOTE_SYMBOLS: &str = "abcdefgr";

/// Symbols that start a state-changing clause
pub const STATE_SYMBOLS: &str = "<>otvl,";

/// Check whether a character opens a new clause
pub fn is_command_symbol(ch: char) -> bool {
    NOTE_SYMBOLS.contains(ch) || STATE_SYMBOLS.contains(ch)
}

/// Strip every non-digit character and parse what is left.
///
/// Returns `None` when the text holds no digits. Values too large for a
/// `u32` saturate instead of wrapping.
pub fn extract_number(text: &str) -> Option<u32> {
    let mut value: Option<u64> = None;
    for digit in text.chars().filter_map(|ch| ch.to_digit(10)) {
        let current = value.unwrap_or(0);
        value = Some(
            current
                .saturating_mul(10)
                .saturating_add(digit as u64)
                .min(u32::MAX as u64),
        );
    }
    value.map(|v| v as u32)
}

/// Modifier characters trailing a clause's command symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// A `+` or `#` is present
    pub sharp: bool,
    /// A `-` is present
    pub flat: bool,
    /// Number of `.` characters
    pub dots: u32,
    /// A `&` is present
    pub tie: bool,
    /// Digits of the clause read as one number
    pub number: Option<u32>,
}

impl Modifiers {
    /// Scan the text that follows a command symbol
    pub fn parse(body: &str) -> Self {
        let mut modifiers = Modifiers {
            number: extract_number(body),
            ..Default::default()
        };
        for ch in body.chars() {
            match ch {
                '+' | '#' => modifiers.sharp = true,
                '-' => modifiers.flat = true,
                '.' => modifiers.dots += 1,
                '&' => modifiers.tie = true,
                _ => {}
            }
        }
        modifiers
    }
}

/// A clause classified by its leading symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// A pitched note
    Note(NoteLetter),
    /// Silence that still takes time
    Rest,
    /// `>`
    OctaveUp,
    /// `<`
    OctaveDown,
    /// `o<n>`
    OctaveSet(Option<u32>),
    /// `t<n>`
    TempoSet(Option<u32>),
    /// `l<n>`
    LengthSet(Option<u32>),
    /// `v<n>`
    VolumeSet(Option<u32>),
    /// `,`
    TrackSeparator,
}

/// One atomic command unit: a command symbol plus its trailing modifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub text: String,
    /// Character offset of the clause in the source
    pub offset: usize,
}

impl Clause {
    pub fn new(text: impl Into<String>, offset: usize) -> Self {
        Self {
            text: text.into(),
            offset,
        }
    }

    /// Build a clause from externally computed boundaries, rejecting any
    /// that does not open with a command symbol
    pub fn checked(text: impl Into<String>, offset: usize) -> Result<Self, MmlError> {
        let text = text.into();
        match text.chars().next() {
            Some(ch) if is_command_symbol(ch) => Ok(Self { text, offset }),
            _ => Err(MmlError::MalformedClause {
                clause: text,
                offset,
            }),
        }
    }

    /// Leading command symbol, if any
    pub fn symbol(&self) -> Option<char> {
        self.text.chars().next()
    }

    /// Text after the command symbol
    pub fn body(&self) -> &str {
        let skip = self.symbol().map_or(0, char::len_utf8);
        &self.text[skip..]
    }

    pub fn modifiers(&self) -> Modifiers {
        Modifiers::parse(self.body())
    }

    /// Map the leading symbol onto a [`Command`]
    pub fn classify(&self) -> Result<Command, MmlError> {
        let number = || extract_number(self.body());
        let symbol = self.symbol().unwrap_or(FILLER);

        if let Some(letter) = NoteLetter::from_char(symbol) {
            return Ok(Command::Note(letter));
        }

        match symbol {
            'r' => Ok(Command::Rest),
            '>' => Ok(Command::OctaveUp),
            '<' => Ok(Command::OctaveDown),
            'o' => Ok(Command::OctaveSet(number())),
            't' => Ok(Command::TempoSet(number())),
            'l' => Ok(Command::LengthSet(number())),
            'v' => Ok(Command::VolumeSet(number())),
            ',' => Ok(Command::TrackSeparator),
            _ => Err(MmlError::UnknownClause {
                clause: self.text.clone(),
                offset: self.offset,
            }),
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.text, self.offset)
    }
}

/// Splits normalized MML text into clauses
pub struct Tokenizer {
    input: Vec<char>,
    position: usize,
    started: bool,
}

impl Tokenizer {
    /// Create a tokenizer over already normalized text
    pub fn new(input: &str) -> Self {
        Tokenizer {
            input: input.chars().collect(),
            position: 0,
            started: false,
        }
    }

    /// Find the next command symbol at or after `from`
    fn next_symbol(&self, from: usize) -> Option<usize> {
        (from..self.input.len()).find(|&i| is_command_symbol(self.input[i]))
    }

    fn is_blank(&self) -> bool {
        self.input
            .iter()
            .all(|&ch| ch.is_whitespace() || ch == FILLER)
    }

    /// Position the cursor on the first clause, discarding leading text.
    ///
    /// Text without any command symbol becomes a single clause at offset 0
    /// so the compiler can report it.
    fn start(&mut self) -> Option<Clause> {
        self.started = true;
        match self.next_symbol(0) {
            Some(first) => {
                self.position = first;
                None
            }
            None => {
                self.position = self.input.len();
                if self.is_blank() {
                    None
                } else {
                    Some(Clause::new(self.input.iter().collect::<String>(), 0))
                }
            }
        }
    }
}

impl Iterator for Tokenizer {
    type Item = Result<Clause, MmlError>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            if let Some(whole) = self.start() {
                return Some(Ok(whole));
            }
        }

        if self.position >= self.input.len() {
            return None;
        }

        let start = self.position;
        let end = self.next_symbol(start + 1).unwrap_or(self.input.len());
        self.position = end;

        let text: String = self.input[start..end].iter().collect();
        Some(Clause::checked(text, start))
    }
}
