fn main() -> anyhow::Result<()> {
    mongodb_traced::run()
}
