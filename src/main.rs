fn main() {
    nanobot_lib::run()
}
