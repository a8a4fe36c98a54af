//! Multicall3 contract interface for batching multiple calls.

use alloy::sol;

sol! {
    /// Multicall3 interface - deployed at the same address on all supported chains
    #[sol(rpc)]
    #[derive(Debug)]
    interface IMulticall3 {
        /// Call structure for batched operations
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        /// Result structure for batched operations
        struct Result {
            bool success;
            bytes returnData;
        }

        /// Execute multiple calls in a single transaction
        function aggregate3(Call3[] calldata calls)
            external payable
            returns (Result[] memory returnData);

        /// Get native balance of an address
        function getEthBalance(address addr) external view returns (uint256 balance);
    }
}
