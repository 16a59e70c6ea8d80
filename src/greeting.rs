//! C binding for the greeting fixture function.

use std::io::{self, Write};

const GREETING: &str = "Hello, world!";

fn write_greeting(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{GREETING}")
}

/// Writes `Hello, world!` and a trailing newline to standard output.
///
/// A failed stdout write is not reported to the caller.
#[unsafe(no_mangle)]
pub extern "C" fn hello() {
    let _ = write_greeting(&mut io::stdout().lock());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_exactly_one_line() {
        let mut out = Vec::new();
        write_greeting(&mut out).unwrap();
        assert_eq!(out, b"Hello, world!\n");
    }

    #[test]
    fn repeated_calls_produce_identical_output() {
        let mut out = Vec::new();
        write_greeting(&mut out).unwrap();
        write_greeting(&mut out).unwrap();
        assert_eq!(out, b"Hello, world!\nHello, world!\n");
    }
}
