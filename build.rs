fn main() {
    println!("cargo:rerun-if-changed=config/node.json");

    // ESP-IDF link arguments are only needed for the firmware build.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
