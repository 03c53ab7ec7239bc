use async_ftp::FtpError;

use crate::error::{Backend, Error, Op};

/// Extracts the three digit reply code from an FTP error, if the server sent one.
pub(crate) fn reply_code(err: &FtpError) -> Option<u16> {
    let FtpError::InvalidResponse(message) = err else {
        return None;
    };

    // "Expected code [250], got response: 550 ..." - the expected codes are
    // bracketed, the first bare three digit token is the server's reply
    message
        .split_whitespace()
        .find(|token| token.len() == 3 && token.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|code| code.parse().ok())
}

/// Classifies an FTP error for the operation it came from.
///
/// Servers use 550 for "no such file", "file exists" and "directory not
/// empty" alike, so the operation and reply text decide which it is.
pub(crate) fn classify(err: FtpError, op: Op, path: &str) -> Error {
    if let FtpError::ConnectionError(ref io) = err {
        return Error::Connection(io.to_string());
    }

    let text = err.to_string().to_ascii_lowercase();
    let path = path.to_owned();

    match (reply_code(&err), op) {
        (Some(421 | 530), _) => Error::Connection(err.to_string()),
        (Some(521), Op::Mkdir) => Error::AlreadyExists(path),
        (Some(550), Op::Mkdir) if text.contains("exists") => Error::AlreadyExists(path),
        (Some(550), Op::Rmdir) if text.contains("not empty") => Error::NotEmpty(path),
        (Some(550), Op::Mkdir | Op::Rmdir) if mentions_missing(&text) => Error::NotFound(path),
        (Some(550), Op::List | Op::Get | Op::Delete | Op::Rename)
            if !text.contains("permission") =>
        {
            Error::NotFound(path)
        }
        _ => Error::backend(Backend::Ftp, &path, err),
    }
}

/// A 550 on `MKD`/`RMD` whose text does not say what went wrong, e.g.
/// vsftpd's "Create directory operation failed.".
pub(crate) fn is_unexplained(err: &FtpError, op: Op) -> bool {
    if reply_code(err) != Some(550) || !matches!(op, Op::Mkdir | Op::Rmdir) {
        return false;
    }

    let text = err.to_string().to_ascii_lowercase();
    !(text.contains("exists")
        || text.contains("not empty")
        || text.contains("permission")
        || mentions_missing(&text))
}

fn mentions_missing(text: &str) -> bool {
    text.contains("no such") || text.contains("not found") || text.contains("not exist")
}
