//! # Event-code and SDEF Dictionaries
//!
//! Resolves the human name behind a four- or eight-byte AppleEvent code, for
//! the [`crate::printer`]'s `Keyword` resolution order: the current
//! command's named parameters, then the current target's vocabulary, then
//! `StandardAdditions`, then the event-code table for the current target,
//! then the default target's table, then a substring fallback for
//! `core*`/`misc*` codes, and finally the raw code text.
//!
//! `AppleScript Language` is the default target; `StandardAdditions` is
//! always consulted as a fallback regardless of the active target.

use std::collections::HashMap;

use once_cell::sync::Lazy;

pub const DEFAULT_TARGET: &str = "AppleScript Language";
pub const STANDARD_ADDITIONS: &str = "StandardAdditions";

/// One scripting-definition entry: a command or property's human name plus
/// its named-parameter table (`parameter code -> name`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SdefEntry {
    pub name: String,
    pub parameters: HashMap<String, String>,
}

/// `event_codes[target][code] -> human_name` and `sdefs[target][code] ->
/// SdefEntry`, consumed by the printer for `Keyword` resolution.
pub trait Dictionary {
    fn event_name(&self, target: &str, code: &str) -> Option<&str>;
    fn sdef(&self, target: &str, code: &str) -> Option<&SdefEntry>;
}

fn builtin_event_codes() -> HashMap<&'static str, HashMap<&'static str, &'static str>> {
    let mut targets = HashMap::new();

    let mut language = HashMap::new();
    language.insert("ascr", "AppleScript");
    language.insert("kocl", "class");
    language.insert("kfrm", "form");
    language.insert("seld", "selection data");
    language.insert("from", "from");
    language.insert("to  ", "to");
    language.insert("kfrmID", "id");
    language.insert("coreactv", "activate");
    language.insert("miscsavo", "save");
    targets.insert(DEFAULT_TARGET, language);

    let mut standard_additions = HashMap::new();
    standard_additions.insert("ascrchar", "ASCII character");
    standard_additions.insert("ascrerr ", "error");
    targets.insert(STANDARD_ADDITIONS, standard_additions);

    targets
}

fn builtin_sdefs() -> HashMap<&'static str, HashMap<&'static str, SdefEntry>> {
    let mut targets: HashMap<&'static str, HashMap<&'static str, SdefEntry>> = HashMap::new();

    let mut language = HashMap::new();
    language.insert(
        "coreactv",
        SdefEntry {
            name: "activate".to_string(),
            parameters: HashMap::new(),
        },
    );
    targets.insert(DEFAULT_TARGET, language);

    let mut standard_additions = HashMap::new();
    let mut display_dialog_params = HashMap::new();
    display_dialog_params.insert("dflt".to_string(), "default answer".to_string());
    display_dialog_params.insert("btns".to_string(), "buttons".to_string());
    standard_additions.insert(
        "coredisp",
        SdefEntry {
            name: "display dialog".to_string(),
            parameters: display_dialog_params,
        },
    );
    standard_additions.insert(
        "ascrchar",
        SdefEntry {
            name: "ASCII character".to_string(),
            parameters: HashMap::new(),
        },
    );
    targets.insert(STANDARD_ADDITIONS, standard_additions);

    targets
}

static EVENT_CODES: Lazy<HashMap<&'static str, HashMap<&'static str, &'static str>>> =
    Lazy::new(builtin_event_codes);
static SDEFS: Lazy<HashMap<&'static str, HashMap<&'static str, SdefEntry>>> =
    Lazy::new(builtin_sdefs);

/// The small built-in vocabulary covering `AppleScript Language` and
/// `StandardAdditions`, enough for the bundled end-to-end scenarios. A
/// full SDEF-derived dictionary is a drop-in replacement behind the same
/// trait.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinDictionary;

impl Dictionary for BuiltinDictionary {
    fn event_name(&self, target: &str, code: &str) -> Option<&str> {
        EVENT_CODES.get(target).and_then(|t| t.get(code)).copied()
    }

    fn sdef(&self, target: &str, code: &str) -> Option<&SdefEntry> {
        SDEFS.get(target).and_then(|t| t.get(code))
    }
}

/// Last-resort fallback for `core*`/`misc*` codes with no exact table
/// entry: a coarse substring classification rather than the raw code.
pub fn fallback_name(code: &str) -> Option<&'static str> {
    if code.starts_with("core") {
        Some("<core command>")
    } else if code.starts_with("misc") {
        Some("<misc command>")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_language_event_code() {
        let dict = BuiltinDictionary;
        assert_eq!(dict.event_name(DEFAULT_TARGET, "coreactv"), Some("activate"));
    }

    #[test]
    fn falls_back_to_standard_additions() {
        let dict = BuiltinDictionary;
        assert_eq!(
            dict.event_name(STANDARD_ADDITIONS, "ascrchar"),
            Some("ASCII character")
        );
    }

    #[test]
    fn unknown_code_has_no_entry() {
        let dict = BuiltinDictionary;
        assert_eq!(dict.event_name(DEFAULT_TARGET, "zzzz"), None);
        assert_eq!(fallback_name("zzzz"), None);
    }

    #[test]
    fn core_prefixed_unknown_code_falls_back() {
        assert_eq!(fallback_name("corexyz"), Some("<core command>"));
    }
}
