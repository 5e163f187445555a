pub mod mark_absent;
