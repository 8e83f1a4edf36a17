fn main() {
    // Forwards ESP-IDF sysenv (paths, linker args) when building for the
    // device; emits nothing on host builds.
    embuild::espidf::sysenv::output();
}
