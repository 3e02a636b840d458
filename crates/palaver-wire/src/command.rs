use crate::{Error, Name, WireResult, MAX_FILENAME_LEN, MAX_FILE_SIZE};

/// Command whitespace is SPACE or TAB only.
const WS: [char; 2] = [' ', '\t'];

/// One decoded command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// `/join NAME ROOM`
    Join { name: Name, room: Name },
    /// A `/join` line that does not carry exactly two valid names
    JoinUsage,
    /// `/msg BODY`
    Msg { body: &'a str },
    /// `/file NAME SIZE`, announcing `size` raw payload bytes
    File { name: &'a str, size: u64 },
    /// `/quit`
    Quit,
    /// Any other non-empty line
    Unknown,
}

/// Validates one whitespace-delimited name token.
pub fn name_token(tok: &str) -> WireResult<Name> {
    if tok.is_empty() {
        return Err(Error::EmptyName);
    }
    if tok.chars().any(char::is_control) {
        return Err(Error::UnprintableName);
    }
    Name::from(tok).map_err(|_| Error::NameLen(tok.len()))
}

impl<'a> Command<'a> {
    /// Decodes one framed line. The line carries no terminator; verbs are
    /// case-sensitive and anything unrecognized is `Unknown`.
    pub fn parse(line: &'a [u8]) -> Self {
        let Ok(text) = std::str::from_utf8(line) else {
            return Self::Unknown;
        };
        let text = text.trim_start_matches(WS);
        let verb_end = text.find(WS).unwrap_or(text.len());
        let (verb, rest) = text.split_at(verb_end);
        let rest = rest.trim_start_matches(WS);

        match verb {
            "/join" => Self::parse_join(rest),
            "/msg" if !rest.is_empty() => Self::Msg { body: rest },
            "/file" => Self::parse_file(rest),
            "/quit" if rest.is_empty() => Self::Quit,
            _ => Self::Unknown,
        }
    }

    fn parse_join(rest: &str) -> Self {
        let mut toks = rest.split(WS).filter(|t| !t.is_empty());
        let (Some(name), Some(room), None) = (toks.next(), toks.next(), toks.next()) else {
            return Self::JoinUsage;
        };
        match (name_token(name), name_token(room)) {
            (Ok(name), Ok(room)) => Self::Join { name, room },
            _ => Self::JoinUsage,
        }
    }

    fn parse_file(rest: &'a str) -> Self {
        let mut toks = rest.split(WS).filter(|t| !t.is_empty());
        let (Some(name), Some(size), None) = (toks.next(), toks.next(), toks.next()) else {
            return Self::Unknown;
        };
        if name.len() > MAX_FILENAME_LEN || name.chars().any(char::is_control) {
            return Self::Unknown;
        }
        let Ok(size) = size.parse::<u64>() else {
            return Self::Unknown;
        };
        if size == 0 || size > MAX_FILE_SIZE {
            return Self::Unknown;
        }
        Self::File { name, size }
    }
}
