pub mod json_lines_transport;
