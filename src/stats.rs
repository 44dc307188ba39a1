//! One summary line per finished ticket.

use log::info;

/// `N = |valid| + |excess| + |invalid|`, with grammatical pluralisation on
/// "transaction".
pub fn emit_summary(valid: usize, excess: usize, invalid: usize, accept: usize, broadcast: usize) {
    let n = valid + excess + invalid;
    let noun = if n == 1 { "transaction" } else { "transactions" };
    info!(
        "Received {n} {noun} (accept: {accept} broadcast: {broadcast} excess: {excess} invalid: {invalid})."
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pluralises_single_transaction() {
        // smoke test only: emit_summary's side effect is a log line, not a
        // return value, so we just check it doesn't panic for both N=1 and
        // N>1 shapes.
        emit_summary(1, 0, 0, 1, 1);
        emit_summary(0, 0, 0, 0, 0);
        emit_summary(3, 1, 1, 3, 2);
    }
}
