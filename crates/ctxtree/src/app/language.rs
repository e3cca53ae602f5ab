//! Static lookup from file extension to code fence language tag.

use std::collections::HashMap;

use once_cell::sync::Lazy;

static EXTENSION_TAGS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("rs", "rust"),
        ("ts", "typescript"),
        ("tsx", "tsx"),
        ("mts", "typescript"),
        ("cts", "typescript"),
        ("js", "javascript"),
        ("jsx", "jsx"),
        ("mjs", "javascript"),
        ("cjs", "javascript"),
        ("json", "json"),
        ("jsonc", "jsonc"),
        ("py", "python"),
        ("pyi", "python"),
        ("rb", "ruby"),
        ("go", "go"),
        ("java", "java"),
        ("kt", "kotlin"),
        ("kts", "kotlin"),
        ("scala", "scala"),
        ("swift", "swift"),
        ("c", "c"),
        ("h", "c"),
        ("cc", "cpp"),
        ("cpp", "cpp"),
        ("cxx", "cpp"),
        ("hpp", "cpp"),
        ("hh", "cpp"),
        ("cs", "csharp"),
        ("fs", "fsharp"),
        ("php", "php"),
        ("lua", "lua"),
        ("dart", "dart"),
        ("ex", "elixir"),
        ("exs", "elixir"),
        ("erl", "erlang"),
        ("hs", "haskell"),
        ("ml", "ocaml"),
        ("clj", "clojure"),
        ("r", "r"),
        ("jl", "julia"),
        ("zig", "zig"),
        ("sh", "bash"),
        ("bash", "bash"),
        ("zsh", "zsh"),
        ("fish", "fish"),
        ("ps1", "powershell"),
        ("bat", "batch"),
        ("sql", "sql"),
        ("graphql", "graphql"),
        ("gql", "graphql"),
        ("proto", "protobuf"),
        ("html", "html"),
        ("htm", "html"),
        ("xml", "xml"),
        ("svg", "xml"),
        ("css", "css"),
        ("scss", "scss"),
        ("sass", "sass"),
        ("less", "less"),
        ("vue", "vue"),
        ("svelte", "svelte"),
        ("md", "markdown"),
        ("markdown", "markdown"),
        ("yaml", "yaml"),
        ("yml", "yaml"),
        ("toml", "toml"),
        ("ini", "ini"),
        ("cfg", "ini"),
        ("dockerfile", "dockerfile"),
        ("tf", "hcl"),
        ("hcl", "hcl"),
        ("nix", "nix"),
        ("diff", "diff"),
        ("patch", "diff"),
    ]
    .into_iter()
    .collect()
});

/// Fence tag for a relative path, based on its extension. Unmapped extensions yield `None`.
pub fn fence_tag(path: &str) -> Option<&'static str> {
    let file_name = path.rsplit(['/', '\\']).next()?;
    if file_name.eq_ignore_ascii_case("dockerfile") {
        return Some("dockerfile");
    }
    let (stem, extension) = file_name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    EXTENSION_TAGS
        .get(extension.to_ascii_lowercase().as_str())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_extensions() {
        assert_eq!(fence_tag("src/main.rs"), Some("rust"));
        assert_eq!(fence_tag("web/App.TSX"), Some("tsx"));
        assert_eq!(fence_tag("docs\\README.md"), Some("markdown"));
        assert_eq!(fence_tag("Dockerfile"), Some("dockerfile"));
    }

    #[test]
    fn unmapped_extensions_have_no_tag() {
        assert_eq!(fence_tag("data.unknownext"), None);
        assert_eq!(fence_tag("Makefile"), None);
        assert_eq!(fence_tag(".gitignore"), None);
    }
}
