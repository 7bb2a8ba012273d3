fn main() -> anyhow::Result<()> {
    pyinterp::run_cli()
}
