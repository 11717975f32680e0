//! Legacy colour-code markup
//!
//! Game chat uses `§` followed by a code character to switch colours and
//! styles. Config files conventionally write `&` instead, which is
//! translated on load.

/// The section sign that introduces a formatting code on the wire
pub const COLOR_CHAR: char = '§';

const CODES: &str = "0123456789AaBbCcDdEeFfKkLlMmNnOoRrXx";

fn is_code(c: char) -> bool {
    CODES.contains(c)
}

/// Replace `alt` followed by a valid code character with `§` + lowercase code
///
/// ```
/// use relink_types::translate_color_codes;
///
/// assert_eq!(translate_color_codes('&', "&aHello &Lworld"), "§aHello §lworld");
/// assert_eq!(translate_color_codes('&', "fish & chips"), "fish & chips");
/// ```
pub fn translate_color_codes(alt: char, text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match chars.peek() {
            Some(&next) if c == alt && is_code(next) => {
                out.push(COLOR_CHAR);
                out.extend(next.to_lowercase());
                chars.next();
            }
            _ => out.push(c),
        }
    }

    out
}

/// Remove every `§`-prefixed formatting code
///
/// ```
/// use relink_types::strip_color;
///
/// assert_eq!(strip_color("§cServer §lclosed"), "Server closed");
/// ```
pub fn strip_color(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == COLOR_CHAR {
            if let Some(&next) = chars.peek() {
                if is_code(next) {
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }

    out
}
