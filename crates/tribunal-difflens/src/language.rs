/// Ordered suffix table consulted by [`detect_language`].
///
/// First match wins. Suffixes that end with a shorter entry must come before
/// it (`.scss` before `.css`), otherwise the shorter one would shadow them.
pub const LANGUAGE_TABLE: &[(&str, &str)] = &[
    (".tsx", "React TSX"),
    (".jsx", "React JSX"),
    (".ts", "TypeScript"),
    (".js", "JavaScript"),
    (".py", "Python"),
    (".java", "Java"),
    (".cpp", "C++"),
    (".cs", "C#"),
    (".c", "C"),
    (".go", "Go"),
    (".rs", "Rust"),
    (".rb", "Ruby"),
    (".php", "PHP"),
    (".swift", "Swift"),
    (".kt", "Kotlin"),
    (".scala", "Scala"),
    (".sql", "SQL"),
    (".html", "HTML"),
    (".scss", "SCSS"),
    (".css", "CSS"),
    (".json", "JSON"),
    (".yaml", "YAML"),
    (".yml", "YAML"),
    (".xml", "XML"),
    (".md", "Markdown"),
];

/// Detect a language from a file path by suffix.
///
/// # Examples
///
/// ```
/// use tribunal_difflens::language::detect_language;
///
/// assert_eq!(detect_language("foo/bar.tsx"), Some("React TSX"));
/// assert_eq!(detect_language("README"), None);
/// ```
pub fn detect_language(path: &str) -> Option<&'static str> {
    LANGUAGE_TABLE
        .iter()
        .find(|(suffix, _)| path.ends_with(suffix))
        .map(|(_, language)| *language)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_extensions() {
        assert_eq!(detect_language("src/main.rs"), Some("Rust"));
        assert_eq!(detect_language("app/models/user.py"), Some("Python"));
        assert_eq!(detect_language("web/index.ts"), Some("TypeScript"));
        assert_eq!(detect_language("web/App.jsx"), Some("React JSX"));
        assert_eq!(detect_language("ci/build.yml"), Some("YAML"));
        assert_eq!(detect_language("lib/core.cpp"), Some("C++"));
        assert_eq!(detect_language("lib/core.c"), Some("C"));
    }

    #[test]
    fn more_specific_suffix_wins() {
        assert_eq!(detect_language("styles/site.scss"), Some("SCSS"));
        assert_eq!(detect_language("styles/site.css"), Some("CSS"));
        assert_eq!(detect_language("foo/bar.tsx"), Some("React TSX"));
    }

    #[test]
    fn unknown_or_missing_extension() {
        assert_eq!(detect_language("README"), None);
        assert_eq!(detect_language("Makefile"), None);
        assert_eq!(detect_language("image.png"), None);
    }

    #[test]
    fn table_has_no_shadowed_entries() {
        for (i, (later, _)) in LANGUAGE_TABLE.iter().enumerate() {
            for (earlier, _) in &LANGUAGE_TABLE[..i] {
                assert!(
                    !later.ends_with(earlier),
                    "{later} is shadowed by earlier entry {earlier}"
                );
            }
        }
    }
}
