pub mod mock_relay;
