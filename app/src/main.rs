fn main() {
    std::process::exit(vkbench::run());
}
