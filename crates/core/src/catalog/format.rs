use once_cell::sync::Lazy;
use regex::Regex;

/// Region markers recognised inside raw file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// `(BR)`
    Brazil,
    /// `(USA)` or `(US)`
    Usa,
    /// `(PT)`
    Portugal,
    /// `(JP)`
    Japan,
}

impl Region {
    /// Flag glyph shown next to the game name.
    pub fn flag(self) -> &'static str {
        match self {
            Region::Brazil => "🇧🇷",
            Region::Usa => "🇺🇸",
            Region::Portugal => "🇵🇹",
            Region::Japan => "🇯🇵",
        }
    }

    /// Short label, used where glyphs do not render.
    pub fn code(self) -> &'static str {
        match self {
            Region::Brazil => "BR",
            Region::Usa => "USA",
            Region::Portugal => "PT",
            Region::Japan => "JP",
        }
    }
}

static ISO_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.iso$").expect("invalid iso suffix regex"));
static REGION_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\((BR|USA|US|PT|JP)\)").expect("invalid region tag regex"));

/// Strip the `.iso` extension and region tags from a raw name.
///
/// When several tags are present the flag follows a fixed priority
/// (BR, USA/US, PT, JP) while every recognised tag is removed.
pub fn format_name(raw: &str) -> (String, Option<Region>) {
    let without_ext = ISO_SUFFIX.replace(raw, "");
    let trimmed = without_ext.trim();

    let mut found = [false; 4];
    for caps in REGION_TAG.captures_iter(trimmed) {
        let tag = caps[1].to_ascii_uppercase();
        let slot = match tag.as_str() {
            "BR" => 0,
            "USA" | "US" => 1,
            "PT" => 2,
            _ => 3,
        };
        found[slot] = true;
    }
    let region = [Region::Brazil, Region::Usa, Region::Portugal, Region::Japan]
        .into_iter()
        .zip(found)
        .find_map(|(region, present)| present.then_some(region));

    let cleaned = REGION_TAG.replace_all(trimmed, "");
    (cleaned.trim().to_string(), region)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_each_recognised_tag() {
        let cases = [
            ("God of War (BR)", Region::Brazil),
            ("God of War (usa)", Region::Usa),
            ("God of War (US)", Region::Usa),
            ("God of War (PT)", Region::Portugal),
            ("God of War (JP)", Region::Japan),
        ];
        for (raw, region) in cases {
            let (name, flag) = format_name(raw);
            assert_eq!(name, "God of War", "raw {raw}");
            assert_eq!(flag, Some(region), "raw {raw}");
        }
    }

    #[test]
    fn untagged_names_only_lose_iso_suffix() {
        assert_eq!(
            format_name("  Okami.ISO"),
            ("Okami".to_string(), None)
        );
        assert_eq!(
            format_name("Final Fantasy X (Europe)"),
            ("Final Fantasy X (Europe)".to_string(), None)
        );
        assert_eq!(format_name("Kingdom Hearts"), ("Kingdom Hearts".to_string(), None));
    }

    #[test]
    fn brazil_wins_over_other_tags() {
        let (name, region) = format_name("Bully (USA) (BR).iso");
        assert_eq!(region, Some(Region::Brazil));
        assert_eq!(name, "Bully");
        assert_eq!(Region::Brazil.flag(), "🇧🇷");
    }

    #[test]
    fn formatting_is_stable() {
        let (once, region) = format_name("Silent Hill 2 (JP).iso");
        let (twice, again) = format_name(&once);
        assert_eq!(once, twice);
        assert_eq!(region, Some(Region::Japan));
        assert_eq!(again, None);
    }
}
