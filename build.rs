fn main() {
    // Only firmware builds need the ESP-IDF environment exported to rustc.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
