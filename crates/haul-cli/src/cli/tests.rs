#[cfg(test)]
mod tests {
    use crate::cli::{Cli, Command};
    use clap::{CommandFactory, Parser};
    use std::path::PathBuf;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_start_defaults_are_unset() {
        let cli = Cli::try_parse_from(["haul", "start"]).unwrap();
        let Command::Start(args) = cli.command;

        assert!(args.port.is_none());
        assert!(args.host.is_none());
        assert!(args.build_command.is_none());
        assert!(!args.open);
        assert!(!cli.verbose && !cli.quiet && !cli.no_color);
    }

    #[test]
    fn test_start_flags() {
        let cli = Cli::try_parse_from([
            "haul",
            "start",
            "--port",
            "9000",
            "--host",
            "127.0.0.1",
            "-b",
            "npx webpack",
            "-d",
            "build",
            "--open",
            "--verbose",
        ])
        .unwrap();
        let Command::Start(args) = cli.command;

        assert_eq!(args.port, Some(9000));
        assert_eq!(args.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(args.build_command.as_deref(), Some("npx webpack"));
        assert_eq!(args.out_dir, Some(PathBuf::from("build")));
        assert!(args.open);
        assert!(cli.verbose);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["haul", "start", "--no-color", "-q"]).unwrap();
        assert!(cli.no_color);
        assert!(cli.quiet);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["haul", "start", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_invalid_port() {
        assert!(Cli::try_parse_from(["haul", "start", "--port", "70000"]).is_err());
        assert!(Cli::try_parse_from(["haul", "start", "--port", "http"]).is_err());
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["haul"]).is_err());
    }
}
