
mod catalog_tests;
mod decoder_tests;
mod persistence_tests;
mod rescan_tests;
