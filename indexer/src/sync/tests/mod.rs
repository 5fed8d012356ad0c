mod mock_ledger;

mod service_tests;
