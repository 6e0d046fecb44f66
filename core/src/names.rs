//! Name normalization for catalog entries.
//!
//! Two levels of folding are applied to raw names coming from upstream
//! sources:
//!
//! - the **canonical** name is a CRN-compliant identifier
//!   (`[a-z0-9-]` only) and is what users see as the reference resource name;
//! - the **comparable** name is a much coarser fold used only as a match key.
//!   Vendor prefixes and suffixes are stripped and all dashes removed, so that
//!   `ibm-some-service-for-ibm-cloud` and `Some Service` collide.
//!
//! The functions in this module are pure. The registry-aware variants that
//! honor do-not-merge exemptions live on
//! [`DoNotMergeRegistry`](crate::DoNotMergeRegistry).
//!
//! # Examples
//!
//! ```
//! use catalog_merge_core::*;
//!
//! assert_eq!(make_canonical_name("Some Service Name"), "some-service-name");
//! assert_eq!(
//!     make_comparable_name("ibm-some-service-name-for-ibm-cloud"),
//!     "someservicename"
//! );
//!
//! let composite = parse_composite_name("is.volume").unwrap();
//! assert_eq!((composite.base, composite.suffix), ("is", "volume"));
//! ```

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Prefix rules for comparable names, applied first-match-wins.
///
/// Longer prefixes must stay ahead of the shorter ones they contain.
pub const COMPARABLE_PREFIXES: &[(&str, &str)] = &[
    ("argonauts-ibm-cloud-", ""),
    ("argonauts-ibm-", ""),
    ("argonauts-", ""),
    ("ibm-cloud-", ""),
    ("ibmcloud-", ""),
    ("ibm-bluemix-", ""),
    ("ibm-", ""),
    ("bluemix-", ""),
    ("testxyz-", "xxyyzz"),
];

/// Suffix rules for comparable names, applied first-match-wins.
///
/// `billing-subscription` maps to itself so that the shorter
/// `-subscription` rule never strips it. The `continuos` spelling matches
/// real catalog entries.
pub const COMPARABLE_SUFFIXES: &[(&str, &str)] = &[
    ("-for-ibm-cloud", ""),
    ("-for-cloud", ""),
    ("-for-the-cloud", ""),
    ("-for-the-ibm-cloud", ""),
    ("-in-ibm-cloud", ""),
    ("-in-the-cloud", ""),
    ("-in-the-ibm-cloud", ""),
    ("-for-bluemix", ""),
    ("-for-ibm-bluemix", ""),
    ("-in-bluemix", ""),
    ("-in-ibm-bluemix", ""),
    ("-paygo", ""),
    ("-sqo", ""),
    ("billing-subscription", "billing-subscription"),
    ("-subscription", ""),
    ("-continuous-delivery", ""),
    ("-for-bluemix-continuos-delivery", ""),
    ("-testzyx", "zzyyxx"),
];

/// Substrings that may not appear anywhere in a CRN service name.
const FORBIDDEN_CRN_SUBSTRINGS: &[&str] = &[
    "ibmcloud",
    "ibm-cloud",
    "bluemix",
    "ibm-bluemix",
    "ibmbluemix",
];

/// Suffixes that may not terminate a CRN service name.
const FORBIDDEN_CRN_SUFFIXES: &[&str] = &["-prod", "-dev", "-test"];

static COMPOSITE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z0-9]+)\.([a-z0-9-]+)$").expect("static regex must compile")
});

static IBM_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bibm\b").expect("static regex must compile"));

/// A name of the form `<base>.<suffix>` identifying a composite child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeName<'a> {
    /// Name of the composite parent (e.g. `is`).
    pub base: &'a str,
    /// Child-specific part (e.g. `volume`).
    pub suffix: &'a str,
}

/// Reasons a name is rejected as a CRN service name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrnNameError {
    #[error("CRN service name \"{name}\" contains forbidden substring \"{fragment}\"")]
    ForbiddenSubstring { name: String, fragment: &'static str },
    #[error("CRN service name \"{0}\" contains the word \"ibm\"")]
    ForbiddenWord(String),
    #[error("CRN service name \"{name}\" ends in forbidden suffix \"{suffix}\"")]
    ForbiddenSuffix { name: String, suffix: &'static str },
}

/// Trims, lowercases and replaces everything outside `[a-z0-9-]` with `-`.
fn fold_to_crn_charset(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|ch| {
            if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
                ch
            } else {
                '-'
            }
        })
        .collect()
}

/// Computes the canonical (CRN-compliant) form of a raw name.
///
/// # Examples
///
/// ```
/// use catalog_merge_core::make_canonical_name;
///
/// assert_eq!(make_canonical_name("  is.Some Service Name "), "is-some-service-name");
/// assert_eq!(make_canonical_name(""), "");
/// ```
pub fn make_canonical_name(raw: &str) -> String {
    fold_to_crn_charset(raw)
}

/// Returns `true` if `raw` is already in canonical form.
pub fn is_name_canonical(raw: &str) -> bool {
    make_canonical_name(raw) == raw
}

/// Computes the comparable form of a raw name, used as a fuzzy match key.
///
/// # Examples
///
/// ```
/// use catalog_merge_core::make_comparable_name;
///
/// assert_eq!(
///     make_comparable_name("testxyz some-service-name testzyx"),
///     "xxyyzzsomeservicenamezzyyxx"
/// );
/// assert_eq!(make_comparable_name("is.some-service-name"), "issomeservicename");
/// ```
pub fn make_comparable_name(raw: &str) -> String {
    let folded = fold_to_crn_charset(raw);

    let mut collapsed = String::with_capacity(folded.len());
    for ch in folded.chars() {
        if ch == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(ch);
    }

    let mut name = collapsed;
    if let Some((prefix, replacement)) = COMPARABLE_PREFIXES
        .iter()
        .find(|(prefix, _)| name.starts_with(prefix))
    {
        name = format!("{replacement}{}", &name[prefix.len()..]);
    }
    if let Some((suffix, replacement)) = COMPARABLE_SUFFIXES
        .iter()
        .find(|(suffix, _)| name.ends_with(suffix))
    {
        name = format!("{}{replacement}", &name[..name.len() - suffix.len()]);
    }

    name.replace('-', "")
}

/// Splits a composite child name into its parent base and suffix.
///
/// The match is strictly lowercase with exactly one dot, and the base may not
/// contain dashes. Returns `None` for anything else.
///
/// # Examples
///
/// ```
/// use catalog_merge_core::parse_composite_name;
///
/// assert!(parse_composite_name("is.floating-ip").is_some());
/// assert!(parse_composite_name("is.foo.bar").is_none());
/// assert!(parse_composite_name("IS.bar").is_none());
/// assert!(parse_composite_name("aa-bb.cc").is_none());
/// ```
pub fn parse_composite_name(raw: &str) -> Option<CompositeName<'_>> {
    let captures = COMPOSITE_NAME_RE.captures(raw)?;
    Some(CompositeName {
        base: captures.get(1)?.as_str(),
        suffix: captures.get(2)?.as_str(),
    })
}

/// Converts a possibly composite name to canonical form.
///
/// Composite names keep their structure with the dot replaced by a dash;
/// anything else goes through [`make_canonical_name`]. The boolean reports
/// whether the name parsed as a composite child name.
///
/// # Examples
///
/// ```
/// use catalog_merge_core::convert_composite_to_canonical;
///
/// assert_eq!(
///     convert_composite_to_canonical("is.floating-ip"),
///     ("is-floating-ip".to_string(), true)
/// );
/// assert_eq!(
///     convert_composite_to_canonical("Floating IP"),
///     ("floating-ip".to_string(), false)
/// );
/// ```
pub fn convert_composite_to_canonical(raw: &str) -> (String, bool) {
    match parse_composite_name(raw) {
        Some(composite) => (format!("{}-{}", composite.base, composite.suffix), true),
        None => (make_canonical_name(raw), false),
    }
}

/// Returns `true` if `canonical` is `raw` itself or the canonical form of
/// the composite name `raw`.
pub fn compare_composite_and_canonical(raw: &str, canonical: &str) -> bool {
    if raw == canonical {
        return true;
    }
    parse_composite_name(raw)
        .is_some_and(|composite| format!("{}-{}", composite.base, composite.suffix) == canonical)
}

/// Checks a name against the CRN service-name rules.
///
/// # Errors
///
/// Returns the first rule the lowercased name violates.
///
/// # Examples
///
/// ```
/// use catalog_merge_core::check_valid_crn_service_name;
///
/// assert!(check_valid_crn_service_name("cloud-object-storage").is_ok());
/// assert!(check_valid_crn_service_name("ibm-cloud-databases").is_err());
/// assert!(check_valid_crn_service_name("my-service-dev").is_err());
/// ```
pub fn check_valid_crn_service_name(name: &str) -> Result<(), CrnNameError> {
    let lower = name.to_lowercase();

    if let Some(fragment) = FORBIDDEN_CRN_SUBSTRINGS
        .iter()
        .copied()
        .find(|fragment| lower.contains(*fragment))
    {
        return Err(CrnNameError::ForbiddenSubstring {
            name: name.to_string(),
            fragment,
        });
    }
    if IBM_WORD_RE.is_match(&lower) {
        return Err(CrnNameError::ForbiddenWord(name.to_string()));
    }
    if let Some(suffix) = FORBIDDEN_CRN_SUFFIXES
        .iter()
        .copied()
        .find(|suffix| lower.ends_with(*suffix))
    {
        return Err(CrnNameError::ForbiddenSuffix {
            name: name.to_string(),
            suffix,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparable_name_strips_prefix_and_suffix() {
        assert_eq!(
            make_comparable_name("ibm-some-service-name-for-ibm-cloud"),
            "someservicename"
        );
        assert_eq!(
            make_comparable_name("testxyz some-service-name testzyx"),
            "xxyyzzsomeservicenamezzyyxx"
        );
        assert_eq!(make_comparable_name("is.some-service-name"), "issomeservicename");
    }

    #[test]
    fn test_comparable_name_prefix_order_is_first_match() {
        assert_eq!(make_comparable_name("argonauts-ibm-cloud-foo"), "foo");
        assert_eq!(make_comparable_name("ibm-cloud-foo"), "foo");
        // Only one prefix rule fires.
        assert_eq!(make_comparable_name("bluemix-ibm-foo"), "ibmfoo");
    }

    #[test]
    fn test_comparable_name_suffix_rules() {
        assert_eq!(make_comparable_name("foo-billing-subscription"), "foobillingsubscription");
        assert_eq!(make_comparable_name("foo-subscription"), "foo");
        assert_eq!(make_comparable_name("foo-paygo"), "foo");
        assert_eq!(make_comparable_name("foo-continuous-delivery"), "foo");
        assert_eq!(
            make_comparable_name("foo-for-bluemix-continuos-delivery"),
            "foo"
        );
        assert_eq!(make_comparable_name("foo-for-the-ibm-cloud"), "foo");
    }

    #[test]
    fn test_comparable_name_collapses_dashes() {
        assert_eq!(make_comparable_name("ibm--foo"), "foo");
        assert_eq!(make_comparable_name("Foo   Bar"), "foobar");
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(make_canonical_name("Some Service Name"), "some-service-name");
        assert_eq!(make_canonical_name("is.Some Service Name"), "is-some-service-name");
        assert_eq!(make_canonical_name(""), "");
        assert_eq!(make_canonical_name("  Ünïcode_name "), "-n-code-name");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let samples = [
            "",
            "Some Service Name",
            "ibm-some-service-name-for-ibm-cloud",
            "testxyz some-service-name testzyx",
            "is.floating-ip",
            "  --weird__Name--  ",
            "foo-billing-subscription",
        ];
        for raw in samples {
            let canonical = make_canonical_name(raw);
            assert_eq!(make_canonical_name(&canonical), canonical, "{raw}");
            assert!(is_name_canonical(&canonical), "{raw}");

            let comparable = make_comparable_name(raw);
            assert_eq!(make_comparable_name(&comparable), comparable, "{raw}");
        }
    }

    #[test]
    fn test_parse_composite_name() {
        assert_eq!(
            parse_composite_name("is.volume"),
            Some(CompositeName {
                base: "is",
                suffix: "volume"
            })
        );
        assert_eq!(parse_composite_name("is.foo.bar"), None);
        assert_eq!(parse_composite_name("IS.bar"), None);
        assert_eq!(parse_composite_name("aa-bb.cc"), None);
        assert_eq!(parse_composite_name("is"), None);
    }

    #[test]
    fn test_convert_and_compare_composite() {
        assert_eq!(
            convert_composite_to_canonical("is.floating-ip"),
            ("is-floating-ip".to_string(), true)
        );
        for raw in ["is.volume", "is.floating-ip", "a1.b-2"] {
            let (canonical, is_composite) = convert_composite_to_canonical(raw);
            assert!(is_composite);
            assert!(compare_composite_and_canonical(raw, &canonical));
        }
        assert!(compare_composite_and_canonical("foo", "foo"));
        assert!(!compare_composite_and_canonical("is.volume", "isvolume"));
        assert!(!compare_composite_and_canonical("is.volume", "is-volumes"));
    }

    #[test]
    fn test_check_valid_crn_service_name() {
        assert!(check_valid_crn_service_name("is").is_ok());
        assert!(check_valid_crn_service_name("cloud-object-storage").is_ok());
        assert!(check_valid_crn_service_name("ibmid").is_ok());
        assert!(matches!(
            check_valid_crn_service_name("IBMCloud-thing"),
            Err(CrnNameError::ForbiddenSubstring { fragment: "ibmcloud", .. })
        ));
        assert!(matches!(
            check_valid_crn_service_name("ibm-foo"),
            Err(CrnNameError::ForbiddenWord(_))
        ));
        assert!(matches!(
            check_valid_crn_service_name("foo-bluemix"),
            Err(CrnNameError::ForbiddenSubstring { .. })
        ));
        assert!(matches!(
            check_valid_crn_service_name("foo-test"),
            Err(CrnNameError::ForbiddenSuffix { suffix: "-test", .. })
        ));
    }
}
