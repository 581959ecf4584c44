//! Script-based fallback font resolution
//!
//! When a document references a font that is not embedded, the engine picks
//! a substitute from the installed Noto/Droid set keyed by the script of the
//! text, with the language tag disambiguating Han. Resolution is a pure
//! lookup against a font catalog, so it is cheap to call per text run.

use std::collections::HashSet;

/// Unicode script of a text run
///
/// `Common`, `Inherited` and `Unknown` never resolve to a fallback font;
/// runs in those scripts keep whatever font the surrounding text uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    Common,
    Inherited,
    Unknown,
    Latin,
    Greek,
    Cyrillic,
    Arabic,
    Armenian,
    Hebrew,
    Syriac,
    Thaana,
    Devanagari,
    Bengali,
    Gurmukhi,
    Gujarati,
    Oriya,
    Tamil,
    Telugu,
    Kannada,
    Malayalam,
    Sinhala,
    Thai,
    Lao,
    Tibetan,
    Myanmar,
    Georgian,
    Ethiopic,
    Cherokee,
    CanadianAboriginal,
    Ogham,
    Runic,
    Khmer,
    Mongolian,
    Yi,
    Hangul,
    Hiragana,
    Katakana,
    Bopomofo,
    Han,
}

impl Script {
    /// Noto family stem for scripts resolved through the generic chain
    ///
    /// Latin, Greek and Cyrillic share the base family (empty stem). CJK
    /// scripts and Arabic have dedicated chains and return `None` here.
    fn stem(self) -> Option<&'static str> {
        match self {
            Script::Latin | Script::Greek | Script::Cyrillic => Some(""),
            Script::Armenian => Some("Armenian"),
            Script::Hebrew => Some("Hebrew"),
            Script::Syriac => Some("Syriac"),
            Script::Thaana => Some("Thaana"),
            Script::Devanagari => Some("Devanagari"),
            Script::Bengali => Some("Bengali"),
            Script::Gurmukhi => Some("Gurmukhi"),
            Script::Gujarati => Some("Gujarati"),
            Script::Oriya => Some("Oriya"),
            Script::Tamil => Some("Tamil"),
            Script::Telugu => Some("Telugu"),
            Script::Kannada => Some("Kannada"),
            Script::Malayalam => Some("Malayalam"),
            Script::Sinhala => Some("Sinhala"),
            Script::Thai => Some("Thai"),
            Script::Lao => Some("Lao"),
            Script::Tibetan => Some("Tibetan"),
            Script::Myanmar => Some("Myanmar"),
            Script::Georgian => Some("Georgian"),
            Script::Ethiopic => Some("Ethiopic"),
            Script::Cherokee => Some("Cherokee"),
            Script::CanadianAboriginal => Some("CanadianAboriginal"),
            Script::Ogham => Some("Ogham"),
            Script::Runic => Some("Runic"),
            Script::Khmer => Some("Khmer"),
            Script::Mongolian => Some("Mongolian"),
            Script::Yi => Some("Yi"),
            _ => None,
        }
    }
}

/// Language tag of a text run, used to disambiguate Han
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    Unspecified,
    Ja,
    Ko,
    ZhHans,
    ZhHant,
}

impl Language {
    /// Parse a BCP 47 tag; unrecognized tags are `Unspecified`
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "ja" => Language::Ja,
            "ko" => Language::Ko,
            "zh-Hans" => Language::ZhHans,
            "zh-Hant" => Language::ZhHant,
            _ => Language::Unspecified,
        }
    }
}

/// Regional face of the CJK collection
///
/// The Noto CJK fonts ship as a single collection; the variant selects the
/// face index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CjkVariant {
    Jp,
    Kr,
    Sc,
    Tc,
}

impl CjkVariant {
    fn face_index(self) -> u32 {
        match self {
            CjkVariant::Jp => 0,
            CjkVariant::Kr => 1,
            CjkVariant::Sc => 2,
            CjkVariant::Tc => 3,
        }
    }
}

/// CJK character collection orderings, as declared by CID-keyed fonts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CjkOrdering {
    AdobeCns,
    AdobeGb,
    AdobeJapan,
    AdobeKorea,
}

impl CjkOrdering {
    fn variant(self) -> CjkVariant {
        match self {
            CjkOrdering::AdobeCns => CjkVariant::Tc,
            CjkOrdering::AdobeGb => CjkVariant::Sc,
            CjkOrdering::AdobeJapan => CjkVariant::Jp,
            CjkOrdering::AdobeKorea => CjkVariant::Kr,
        }
    }
}

/// A resolved substitute font
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackFont {
    /// Catalog name of the font file
    pub name: String,
    /// Face index within a collection; 0 for single-face fonts
    pub index: u32,
}

/// The set of substitute fonts installed on the system
///
/// Catalog names are file stems without extension. The default catalog
/// mirrors a typical Android font set: the base and per-script Noto Sans
/// families, the CJK collection, and the Droid fallback.
#[derive(Debug, Clone)]
pub struct FontCatalog {
    names: HashSet<String>,
}

impl FontCatalog {
    /// An empty catalog; every resolution returns `None`
    pub fn empty() -> Self {
        Self { names: HashSet::new() }
    }

    pub fn with_fonts<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { names: names.into_iter().map(Into::into).collect() }
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    fn first_present(&self, candidates: &[String]) -> Option<String> {
        candidates.iter().find(|c| self.contains(c)).cloned()
    }
}

impl Default for FontCatalog {
    fn default() -> Self {
        let mut catalog = Self::with_fonts([
            "NotoSerif-Regular",
            "NotoSans-Regular",
            "NotoNaskhArabic-Regular",
            "NotoSerifCJK-Regular",
            "NotoSansCJK-Regular",
            "DroidSansFallback",
        ]);
        for stem in [
            "Armenian",
            "Hebrew",
            "Syriac",
            "Thaana",
            "Devanagari",
            "Bengali",
            "Gurmukhi",
            "Gujarati",
            "Oriya",
            "Tamil",
            "Telugu",
            "Kannada",
            "Malayalam",
            "Sinhala",
            "Thai",
            "Lao",
            "Tibetan",
            "Myanmar",
            "Georgian",
            "Ethiopic",
            "Cherokee",
            "CanadianAboriginal",
            "Ogham",
            "Runic",
            "Khmer",
            "Mongolian",
            "Yi",
        ] {
            catalog.insert(format!("NotoSans{stem}-Regular"));
        }
        catalog
    }
}

fn resolve_generic(catalog: &FontCatalog, stem: &str) -> Option<FallbackFont> {
    let candidates = [
        format!("NotoSerif{stem}-Regular"),
        format!("NotoSans{stem}-Regular"),
        format!("DroidSans{stem}-Regular"),
    ];
    catalog.first_present(&candidates).map(|name| FallbackFont { name, index: 0 })
}

fn resolve_arabic(catalog: &FontCatalog) -> Option<FallbackFont> {
    let candidates = [
        "NotoNaskh-Regular".to_owned(),
        "NotoNaskhArabic-Regular".to_owned(),
        "DroidNaskh-Regular".to_owned(),
        "NotoSerifArabic-Regular".to_owned(),
        "NotoSansArabic-Regular".to_owned(),
        "DroidSansArabic-Regular".to_owned(),
    ];
    catalog.first_present(&candidates).map(|name| FallbackFont { name, index: 0 })
}

fn resolve_cjk_variant(catalog: &FontCatalog, variant: CjkVariant) -> Option<FallbackFont> {
    for name in ["NotoSerifCJK-Regular", "NotoSansCJK-Regular"] {
        if catalog.contains(name) {
            return Some(FallbackFont { name: name.to_owned(), index: variant.face_index() });
        }
    }
    if catalog.contains("DroidSansFallback") {
        return Some(FallbackFont { name: "DroidSansFallback".to_owned(), index: 0 });
    }
    None
}

/// Resolve a substitute font for a script and language
///
/// The style flags are accepted alongside the script but never change the
/// outcome: the fallback faces ship in a single regular weight. Returns
/// `None` when the script carries no fallback (`Common`, `Inherited`,
/// `Unknown`) or when no candidate is installed.
pub fn resolve(
    catalog: &FontCatalog,
    script: Script,
    language: Language,
    _serif: bool,
    _bold: bool,
    _italic: bool,
) -> Option<FallbackFont> {
    match script {
        Script::Common | Script::Inherited | Script::Unknown => None,

        Script::Hangul => resolve_cjk_variant(catalog, CjkVariant::Kr),
        Script::Hiragana | Script::Katakana => resolve_cjk_variant(catalog, CjkVariant::Jp),
        Script::Bopomofo => resolve_cjk_variant(catalog, CjkVariant::Tc),
        Script::Han => {
            let variant = match language {
                Language::Ja => CjkVariant::Jp,
                Language::Ko => CjkVariant::Kr,
                Language::ZhHans => CjkVariant::Sc,
                Language::ZhHant | Language::Unspecified => CjkVariant::Tc,
            };
            resolve_cjk_variant(catalog, variant)
        }

        Script::Arabic => resolve_arabic(catalog),

        other => match other.stem() {
            Some(stem) => resolve_generic(catalog, stem),
            None => None,
        },
    }
}

/// Resolve the CJK substitute for a CID character collection ordering
pub fn resolve_cjk(catalog: &FontCatalog, ordering: CjkOrdering) -> Option<FallbackFont> {
    resolve_cjk_variant(catalog, ordering.variant())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_default(script: Script, language: Language) -> Option<FallbackFont> {
        resolve(&FontCatalog::default(), script, language, false, false, false)
    }

    #[test]
    fn test_common_scripts_have_no_fallback() {
        for script in [Script::Common, Script::Inherited, Script::Unknown] {
            assert_eq!(resolve_default(script, Language::Unspecified), None);
        }
    }

    #[test]
    fn test_latin_falls_through_serif_to_sans() {
        // Default catalog has both; serif wins
        let font = resolve_default(Script::Latin, Language::Unspecified).unwrap();
        assert_eq!(font.name, "NotoSerif-Regular");

        let sans_only = FontCatalog::with_fonts(["NotoSans-Regular"]);
        let font = resolve(&sans_only, Script::Cyrillic, Language::Unspecified, true, true, true)
            .unwrap();
        assert_eq!(font.name, "NotoSans-Regular");
    }

    #[test]
    fn test_style_flags_do_not_change_outcome() {
        let plain = resolve_default(Script::Thai, Language::Unspecified);
        let styled = resolve(
            &FontCatalog::default(),
            Script::Thai,
            Language::Unspecified,
            true,
            true,
            true,
        );
        assert_eq!(plain, styled);
        assert_eq!(plain.unwrap().name, "NotoSansThai-Regular");
    }

    #[test]
    fn test_han_variant_follows_language() {
        let cases = [
            (Language::Ja, 0),
            (Language::Ko, 1),
            (Language::ZhHans, 2),
            (Language::ZhHant, 3),
            (Language::Unspecified, 3),
        ];
        for (language, index) in cases {
            let font = resolve_default(Script::Han, language).unwrap();
            assert_eq!(font.name, "NotoSerifCJK-Regular");
            assert_eq!(font.index, index);
        }
    }

    #[test]
    fn test_kana_and_hangul_pick_regional_faces() {
        assert_eq!(resolve_default(Script::Hiragana, Language::Unspecified).unwrap().index, 0);
        assert_eq!(resolve_default(Script::Katakana, Language::Unspecified).unwrap().index, 0);
        assert_eq!(resolve_default(Script::Hangul, Language::Unspecified).unwrap().index, 1);
        assert_eq!(resolve_default(Script::Bopomofo, Language::Unspecified).unwrap().index, 3);
    }

    #[test]
    fn test_cjk_droid_fallback_is_single_face() {
        let catalog = FontCatalog::with_fonts(["DroidSansFallback"]);
        let font = resolve(&catalog, Script::Han, Language::Ja, false, false, false).unwrap();
        assert_eq!(font.name, "DroidSansFallback");
        assert_eq!(font.index, 0);
    }

    #[test]
    fn test_arabic_chain_order() {
        let font = resolve_default(Script::Arabic, Language::Unspecified).unwrap();
        assert_eq!(font.name, "NotoNaskhArabic-Regular");

        let mut catalog = FontCatalog::default();
        catalog.insert("NotoNaskh-Regular");
        let font = resolve(&catalog, Script::Arabic, Language::Unspecified, false, false, false)
            .unwrap();
        assert_eq!(font.name, "NotoNaskh-Regular");
    }

    #[test]
    fn test_empty_catalog_resolves_nothing() {
        let catalog = FontCatalog::empty();
        assert_eq!(resolve(&catalog, Script::Latin, Language::Unspecified, false, false, false), None);
        assert_eq!(resolve_cjk(&catalog, CjkOrdering::AdobeJapan), None);
    }

    #[test]
    fn test_ordering_maps_to_variant() {
        let catalog = FontCatalog::default();
        assert_eq!(resolve_cjk(&catalog, CjkOrdering::AdobeJapan).unwrap().index, 0);
        assert_eq!(resolve_cjk(&catalog, CjkOrdering::AdobeKorea).unwrap().index, 1);
        assert_eq!(resolve_cjk(&catalog, CjkOrdering::AdobeGb).unwrap().index, 2);
        assert_eq!(resolve_cjk(&catalog, CjkOrdering::AdobeCns).unwrap().index, 3);
    }

    #[test]
    fn test_language_tag_parsing() {
        assert_eq!(Language::from_tag("ja"), Language::Ja);
        assert_eq!(Language::from_tag("zh-Hans"), Language::ZhHans);
        assert_eq!(Language::from_tag("en"), Language::Unspecified);
    }
}
