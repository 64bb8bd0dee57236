fn main() {
    // ESP-IDF sysenv is only meaningful for on-device builds; host builds
    // (tests, CI) skip it so no ESP toolchain is required.
    if std::env::var("CARGO_FEATURE_ESPIDF").is_ok() {
        embuild::espidf::sysenv::output();
    }
}
