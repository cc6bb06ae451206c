fn main() -> Result<(), Box<dyn std::error::Error>> {
    ai_writer::cli::main()
}
