fn main() -> anyhow::Result<()> {
    widelong_cli::run()
}
