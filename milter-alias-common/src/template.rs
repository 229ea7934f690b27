//! Placeholder substitution for directory query templates.
//!
//! | placeholder | replaced by                               |
//! |-------------|-------------------------------------------|
//! | `%u`        | the whole address                         |
//! | `%d`        | the domain part (after the first `@`)     |
//! | `%n`        | the local part (before the first `@`)     |
//!
//! Substituted values are inserted verbatim. Characters with a meaning in
//! LDAP filters are not escaped.

/// An address split at its first `@`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressParts<'a> {
    pub full: &'a [u8],
    pub local: &'a [u8],
    pub domain: &'a [u8],
}

impl<'a> AddressParts<'a> {
    /// Without an `@` the whole address is the local part and the domain is
    /// empty.
    pub fn split(address: &'a [u8]) -> Self {
        let (local, domain) = address
            .iter()
            .position(|&b| b == b'@')
            .map_or((address, &b""[..]), |at| {
                (&address[..at], &address[at + 1..])
            });

        Self {
            full: address,
            local,
            domain,
        }
    }

    const fn for_placeholder(&self, placeholder: u8) -> Option<&'a [u8]> {
        match placeholder {
            b'u' => Some(self.full),
            b'd' => Some(self.domain),
            b'n' => Some(self.local),
            _ => None,
        }
    }
}

/// Replaces `%u`, `%d` and `%n` in `template` with parts of `address`.
///
/// The template is scanned once, left to right. Text that was inserted for
/// one placeholder is never scanned again, so an address containing `%d`
/// ends up in the output literally. A `%` followed by anything else is kept
/// as is.
pub fn substitute(template: &str, address: &[u8]) -> Vec<u8> {
    let parts = AddressParts::split(address);
    let template = template.as_bytes();
    let mut output = Vec::with_capacity(template.len() + address.len());

    let mut rest = template;
    while let Some(percent) = rest.iter().position(|&b| b == b'%') {
        output.extend_from_slice(&rest[..percent]);

        match rest
            .get(percent + 1)
            .and_then(|&placeholder| parts.for_placeholder(placeholder))
        {
            Some(value) => {
                output.extend_from_slice(value);
                rest = &rest[percent + 2..];
            }
            None => {
                output.push(b'%');
                rest = &rest[percent + 1..];
            }
        }
    }
    output.extend_from_slice(rest);

    output
}
