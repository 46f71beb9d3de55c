fn main() -> ! {
    syscage_cli::run_main()
}
