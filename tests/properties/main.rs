mod roundtrip_tests;
mod safety_tests;
mod verification_tests;
