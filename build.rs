fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // ESP-IDF environment (linker args, sdkconfig) only matters for the
    // device build. Host builds and tests skip it entirely.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
