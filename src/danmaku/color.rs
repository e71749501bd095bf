pub const MAX_COLOR: i64 = 0xff_ffff;

pub fn hex_to_int(hex: &str) -> Result<i64, std::num::ParseIntError> {
    let digits = hex.trim().trim_start_matches('#');
    i64::from_str_radix(digits, 16)
}

pub fn int_to_hex(value: i64) -> String {
    format!("#{value:06x}")
}

// Strict `#rrggbb`: no shorthand, no bare digits.
pub fn parse_hex_color(hex: &str) -> Option<i64> {
    let digits = hex.trim().strip_prefix('#')?;
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    hex_to_int(digits).ok()
}

pub fn clamp_color(value: i64) -> i64 {
    value.clamp(0, MAX_COLOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_to_int_parses_white_and_black() {
        assert_eq!(hex_to_int("#ffffff").expect("white"), 16_777_215);
        assert_eq!(hex_to_int("#000000").expect("black"), 0);
        assert_eq!(hex_to_int("#FF0000").expect("red"), 0xff0000);
    }

    #[test]
    fn hex_to_int_rejects_non_hex_digits() {
        assert!(hex_to_int("#zzzzzz").is_err());
        assert!(hex_to_int("").is_err());
    }

    #[test]
    fn parse_hex_color_needs_six_digits_after_the_hash() {
        assert_eq!(parse_hex_color("#ffffff"), Some(16_777_215));
        assert_eq!(parse_hex_color(" #00FF00 "), Some(0x00ff00));
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("ffffff"), None);
        assert_eq!(parse_hex_color("#fffffff"), None);
        assert_eq!(parse_hex_color("#+fffff"), None);
    }

    #[test]
    fn int_to_hex_zero_pads_to_six_digits() {
        assert_eq!(int_to_hex(16_777_215), "#ffffff");
        assert_eq!(int_to_hex(0), "#000000");
        assert_eq!(int_to_hex(0xff), "#0000ff");
    }

    #[test]
    fn clamp_color_bounds_to_24_bits() {
        assert_eq!(clamp_color(-5), 0);
        assert_eq!(clamp_color(20_000_000), MAX_COLOR);
        assert_eq!(clamp_color(1234), 1234);
    }
}
