#![no_main]

use libfuzzer_sys::fuzz_target;
use mime_info::MimeDatabase;

fuzz_target!(|data: &[u8]| {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    // Malformed definitions must error out, never panic
    let db = MimeDatabase::new();
    let _ = rt.block_on(db.add_mime_types(data));
    let _ = db.find_by_name("probe.txt");
    let _ = db.find_by_data(data);
});
