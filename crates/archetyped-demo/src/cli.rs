//! CLI argument definitions using clap derive macros.

use clap::Parser;

/// Demo host for the archetyped extension orchestrator
///
/// Loads a `math` and a `calculator` extension, evaluates a sum through the
/// calculator service and tears the application down again.
#[derive(Parser, Debug)]
#[command(name = "archetyped-demo")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Values to add up through the calculator service
    #[arg(default_values_t = vec![2, 3])]
    pub values: Vec<i64>,

    /// Start with math only and hot-plug the calculator afterwards
    #[arg(long)]
    pub hot_plug: bool,

    /// Keep extension instances across hot-plug passes
    #[arg(long)]
    pub reuse: bool,

    /// Leave the math extension out so the calculator cannot resolve
    #[arg(long)]
    pub missing: bool,

    /// Fail on the first error instead of reporting it and carrying on
    #[arg(long)]
    pub strict: bool,

    /// Print application events as JSON lines
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let cli = Cli::parse_from(["archetyped-demo"]);
        assert_eq!(cli.values, vec![2, 3]);
        assert!(!cli.hot_plug);
        assert!(!cli.json);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from(["archetyped-demo", "--hot-plug", "--reuse", "40", "2"]);
        assert_eq!(cli.values, vec![40, 2]);
        assert!(cli.hot_plug);
        assert!(cli.reuse);
        assert!(!cli.strict);
    }
}
