// Tests for flock-api-derive live in tests/
