fn main() -> anyhow::Result<()> {
    packrat::cli::run_cli()
}
