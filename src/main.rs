fn main() {
    wristguard_lib::run()
}
