//! Color parsing shared by color canonicalization and the visual comparator.

/// Attributes that carry a paint or color value.
pub const COLOR_ATTRS: &[&str] = &[
    "fill",
    "stroke",
    "stop-color",
    "flood-color",
    "lighting-color",
    "color",
];

/// Named colors that are common enough to show up in hand-written SVG.
const NAMED_COLORS: &[(&str, &str)] = &[
    ("black", "#000000"),
    ("white", "#ffffff"),
    ("red", "#ff0000"),
    ("lime", "#00ff00"),
    ("green", "#008000"),
    ("blue", "#0000ff"),
    ("yellow", "#ffff00"),
    ("cyan", "#00ffff"),
    ("aqua", "#00ffff"),
    ("magenta", "#ff00ff"),
    ("fuchsia", "#ff00ff"),
    ("gray", "#808080"),
    ("grey", "#808080"),
    ("silver", "#c0c0c0"),
    ("maroon", "#800000"),
    ("olive", "#808000"),
    ("navy", "#000080"),
    ("purple", "#800080"),
    ("teal", "#008080"),
    ("orange", "#ffa500"),
];

/// Convert `rgb(r,g,b)` or an opaque `rgba(r,g,b,a)` to `#rrggbb`.
///
/// Returns `None` for anything else, including translucent rgba.
pub fn rgb_to_hex(value: &str) -> Option<String> {
    let value = value.trim();
    let lower = value.to_ascii_lowercase();
    let (inner, has_alpha) = if let Some(rest) = lower.strip_prefix("rgba(") {
        (rest.strip_suffix(')')?, true)
    } else if let Some(rest) = lower.strip_prefix("rgb(") {
        (rest.strip_suffix(')')?, false)
    } else {
        return None;
    };

    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    let channels = match (parts.len(), has_alpha) {
        (3, false) => &parts[..],
        (4, true) => {
            if !is_opaque(parts[3])? {
                return None;
            }
            &parts[..3]
        }
        _ => return None,
    };

    let mut hex = String::from("#");
    for channel in channels {
        hex.push_str(&format!("{:02x}", parse_channel(channel)?));
    }
    Some(hex)
}

fn parse_channel(s: &str) -> Option<u8> {
    let value = match s.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f64>().ok()? * 255.0 / 100.0,
        None => s.parse::<f64>().ok()?,
    };
    if !value.is_finite() {
        return None;
    }
    Some(value.round().clamp(0.0, 255.0) as u8)
}

fn is_opaque(alpha: &str) -> Option<bool> {
    let value = match alpha.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f64>().ok()? / 100.0,
        None => alpha.parse::<f64>().ok()?,
    };
    Some(value >= 0.999)
}

/// Normalize a color for comparison: lowercase `#rrggbb` where the value is
/// recognizable, `none` for no paint, otherwise the trimmed lowercase text.
pub fn normalize_color(value: &str) -> String {
    let lower = value.trim().to_ascii_lowercase();

    if lower == "none" || lower == "transparent" {
        return "none".into();
    }
    if let Some(hex) = rgb_to_hex(&lower) {
        return hex;
    }
    if let Some((_, hex)) = NAMED_COLORS.iter().find(|(name, _)| *name == lower) {
        return (*hex).to_string();
    }
    if let Some(digits) = lower.strip_prefix('#')
        && digits.len() == 3
        && digits.chars().all(|c| c.is_ascii_hexdigit())
    {
        return digits.chars().fold(String::from("#"), |mut acc, c| {
            acc.push(c);
            acc.push(c);
            acc
        });
    }
    lower
}

/// True for paint values that name an actual color.
pub fn is_concrete_color(value: &str) -> bool {
    let lower = value.trim().to_ascii_lowercase();
    !(lower.is_empty()
        || lower == "none"
        || lower == "inherit"
        || lower == "currentcolor"
        || lower == "transparent"
        || lower.starts_with("url("))
}

/// Look up a declaration in a `style` attribute.
pub fn style_property<'a>(style: &'a str, property: &str) -> Option<&'a str> {
    style.split(';').find_map(|decl| {
        let (prop, value) = decl.split_once(':')?;
        (prop.trim() == property).then(|| value.trim())
    })
}
