/// The `name` and `filename` parameters of a part's `Content-Disposition` header.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Disposition {
    pub(crate) name: Option<String>,
    pub(crate) filename: Option<String>,
}

impl Disposition {
    /// Picks up the parameters from one part header line, if it is a
    /// `Content-Disposition` line. Other headers are ignored.
    pub(crate) fn absorb_line(&mut self, line: &str) {
        let Some((header, value)) = line.split_once(':') else {
            return;
        };
        if !header.trim().eq_ignore_ascii_case("content-disposition") {
            return;
        }

        for (key, value) in Params::new(value) {
            if key.eq_ignore_ascii_case("name") {
                self.name = Some(value.to_owned());
            } else if key.eq_ignore_ascii_case("filename") {
                self.filename = Some(value.to_owned());
            }
        }
    }
}

/// Iterates the `key=value` parameters following the disposition type.
///
/// Quoted values run to the next `"`: browsers percent-encode quotes inside file names,
/// so there is no escaping to undo, and `;` inside quotes stays part of the value.
struct Params<'a> {
    rest: &'a str,
}

impl<'a> Params<'a> {
    fn new(value: &'a str) -> Self {
        Self { rest: value }
    }
}

impl<'a> Iterator for Params<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let rest = self.rest.trim_start_matches([' ', '\t', ';']);
            if rest.is_empty() {
                return None;
            }

            let key_end = rest.find(['=', ';']).unwrap_or(rest.len());
            let key = rest[..key_end].trim();

            if !rest[key_end..].starts_with('=') {
                // a bare token such as the `form-data` disposition type
                self.rest = &rest[key_end..];
                continue;
            }

            let after = rest[key_end + 1..].trim_start();
            let (value, remaining) = match after.strip_prefix('"') {
                Some(quoted) => match quoted.find('"') {
                    Some(close) => (&quoted[..close], &quoted[close + 1..]),
                    None => (quoted, ""),
                },
                None => {
                    let end = after.find(';').unwrap_or(after.len());
                    (after[..end].trim_end(), &after[end..])
                }
            };

            self.rest = remaining;
            return Some((key, value));
        }
    }
}
