//! Parser for `LIST` replies.
//!
//! FTP servers answer `LIST` with free-form text. The two layouts seen in
//! practice are handled: Unix `ls -l` lines and the DOS/IIS layout.

use crate::file::{FileInfo, FileKind, DIR_TAG, FILE_TAG};

/// One parsed line of a `LIST` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpListing {
    /// Single character type tag, `d` for directories.
    pub type_tag: char,
    pub name: String,
    pub size: Option<u64>,
}

impl From<FtpListing> for FileInfo {
    fn from(listing: FtpListing) -> Self {
        FileInfo::new(
            listing.name,
            listing.size,
            FileKind::from_tag(listing.type_tag),
        )
    }
}

/// Parses a whole `LIST` reply, skipping lines that are not entries
/// (`total 12`, blank lines) as well as `.` and `..`.
pub fn parse_listing<I, S>(lines: I) -> Vec<FtpListing>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| parse_line(line.as_ref()))
        .filter(|entry| entry.name != "." && entry.name != "..")
        .collect()
}

/// Parses a single `LIST` line.
pub fn parse_line(line: &str) -> Option<FtpListing> {
    let line = line.trim_end_matches(['\r', '\n']);
    let first = line.chars().next()?;

    if first.is_ascii_digit() {
        parse_dos(line)
    } else {
        parse_unix(line)
    }
}

fn parse_unix(line: &str) -> Option<FtpListing> {
    let perms = line.split_whitespace().next()?;
    if perms.len() < 10 || !"-dlbcps".contains(perms.chars().next()?) {
        return None;
    }

    // perms links owner group size month day time|year name
    // some servers leave out the group column
    let (size, name) = match split_fields(line, 8) {
        Some((fields, name)) if is_month(fields[5]) => (fields[4], name),
        _ => {
            let (fields, name) = split_fields(line, 7)?;
            if !is_month(fields[4]) {
                return None;
            }
            (fields[3], name)
        }
    };

    let type_tag = perms.chars().next()?;
    let name = if type_tag == 'l' {
        name.split(" -> ").next().unwrap_or(name)
    } else {
        name
    };

    if name.is_empty() {
        return None;
    }

    Some(FtpListing {
        type_tag,
        name: name.to_owned(),
        size: size.parse().ok(),
    })
}

fn parse_dos(line: &str) -> Option<FtpListing> {
    let (fields, name) = split_fields(line, 3)?;
    if !fields[0].contains('-') || name.is_empty() {
        return None;
    }

    let (type_tag, size) = if fields[2].eq_ignore_ascii_case("<DIR>") {
        (DIR_TAG, None)
    } else {
        (FILE_TAG, Some(fields[2].parse().ok()?))
    };

    Some(FtpListing {
        type_tag,
        name: name.to_owned(),
        size,
    })
}

/// Splits `n` whitespace separated fields off the front of `line`.
/// The remainder is returned verbatim so names keep inner spaces.
fn split_fields(line: &str, n: usize) -> Option<(Vec<&str>, &str)> {
    let mut rest = line.trim_start();
    let mut fields = Vec::with_capacity(n);

    for _ in 0..n {
        let end = rest.find(char::is_whitespace)?;
        fields.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }

    Some((fields, rest))
}

fn is_month(field: &str) -> bool {
    field.len() == 3 && field.chars().all(|c| c.is_ascii_alphabetic())
}
